use std::fs;
use std::path::{Path, PathBuf};

use collector_logging::collector_info;
use thiserror::Error;
use timeline_core::{normalize_username, parse_resume_input, ParsedResume};

/// User-facing failures when importing a resume/export file.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path} contains no recognizable timeline items")]
    Unrecognized { path: PathBuf },
    #[error("{path} belongs to @{found}, not @{expected}")]
    UsernameMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Reads a previously exported or saved file for resuming.
///
/// When `expected_username` is given and the file names a different account, the
/// import is refused rather than silently merged.
pub fn import_resume_file(
    path: &Path,
    expected_username: Option<&str>,
) -> Result<ParsedResume, ImportError> {
    let content = fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| ImportError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;

    let parsed = parse_resume_input(&value);
    if parsed.tweets.is_empty() && parsed.meta.is_none() {
        return Err(ImportError::Unrecognized {
            path: path.to_path_buf(),
        });
    }

    if let (Some(expected), Some(found)) = (
        expected_username.and_then(normalize_username),
        parsed.username.as_deref(),
    ) {
        if expected != found {
            return Err(ImportError::UsernameMismatch {
                path: path.to_path_buf(),
                expected,
                found: found.to_string(),
            });
        }
    }

    collector_info!(
        "Imported {} items from {:?} (username {:?})",
        parsed.tweets.len(),
        path,
        parsed.username
    );
    Ok(parsed)
}
