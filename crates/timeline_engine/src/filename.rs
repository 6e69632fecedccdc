use chrono::{DateTime, Utc};
use timeline_core::Millis;

const MAX_STEM_LEN: usize = 64;

/// Windows-safe, deterministic export name: `{username}_timeline_{yyyymmdd-hhmmss}.json`.
pub fn export_filename(username: Option<&str>, exported_at: Millis) -> String {
    let stem = sanitize_stem(username.unwrap_or("timeline"));
    let stamp = DateTime::<Utc>::from_timestamp_millis(exported_at)
        .unwrap_or_default()
        .format("%Y%m%d-%H%M%S");
    format!("{stem}_timeline_{stamp}.json")
}

/// Stable resume file name for a normalized username.
pub fn resume_filename(username: &str) -> String {
    format!("resume_{}.json", sanitize_stem(username))
}

fn sanitize_stem(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        // Collapse runs of underscores.
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        cleaned.push(c);
    }
    let mut stem = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if stem.is_empty() {
        stem = "timeline".to_string();
    }
    if stem.len() > MAX_STEM_LEN {
        let mut end = MAX_STEM_LEN;
        while !stem.is_char_boundary(end) {
            end -= 1;
        }
        stem.truncate(end);
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
