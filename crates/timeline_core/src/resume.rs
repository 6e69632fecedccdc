//! Resume payload parsing/building and the first-occurrence-wins merge.

use std::collections::HashSet;

use collector_logging::collector_debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::{now_millis, Millis};
use crate::normalize::{normalize_stored, TimelineItem};

/// Provenance counters of a merge. Always derived, never edited by hand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportMeta {
    pub username: Option<String>,
    pub previous_count: usize,
    pub new_count: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
}

impl ExportMeta {
    /// Lenient read of a stored meta object; missing or mistyped counters read as 0.
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let count = |key: &str| {
            map.get(key)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(0)
        };
        Some(Self {
            username: normalize_username_value(map.get("username")),
            previous_count: count("previousCount"),
            new_count: count("newCount"),
            duplicates_removed: count("duplicatesRemoved"),
            final_count: count("finalCount"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedResume {
    pub tweets: Vec<TimelineItem>,
    pub meta: Option<ExportMeta>,
    pub username: Option<String>,
}

/// Persisted snapshot of a session's items, scoped by normalized username.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    pub username: Option<String>,
    pub saved_at: Millis,
    pub meta: Option<ExportMeta>,
    pub tweets: Vec<TimelineItem>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResumeDraft {
    pub username: String,
    pub tweets: Vec<TimelineItem>,
    pub meta: Option<ExportMeta>,
    pub saved_at: Option<Millis>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub items: Vec<TimelineItem>,
    pub meta: ExportMeta,
}

/// Trims whitespace, strips one leading `@` and lowercases. Empty results are `None`.
pub fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    (!stripped.is_empty()).then(|| stripped.to_lowercase())
}

fn normalize_username_value(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).and_then(normalize_username)
}

/// Reads any of the accepted export/resume shapes.
///
/// Item lists are taken from, in priority order: a bare array, an `items` array, a
/// `tweets` array. Anything else yields an empty result.
pub fn parse_resume_input(data: &Value) -> ParsedResume {
    match data {
        Value::Array(values) => ParsedResume {
            tweets: stored_items(values),
            ..ParsedResume::default()
        },
        Value::Object(map) => parse_object(map),
        _ => ParsedResume::default(),
    }
}

fn parse_object(map: &Map<String, Value>) -> ParsedResume {
    let tweets = ["items", "tweets"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
        .map(|values| stored_items(values))
        .unwrap_or_default();

    let meta_value = ["meta", "metadata"]
        .iter()
        .find_map(|key| map.get(*key).filter(|value| !value.is_null()));
    let meta = meta_value.and_then(ExportMeta::from_value);

    let username = meta
        .as_ref()
        .and_then(|meta| meta.username.clone())
        .or_else(|| normalize_username_value(map.get("username")));

    ParsedResume {
        tweets,
        meta,
        username,
    }
}

fn stored_items(values: &[Value]) -> Vec<TimelineItem> {
    let items: Vec<_> = values.iter().filter_map(normalize_stored).collect();
    if items.len() != values.len() {
        collector_debug!(
            "dropped {} unrecognized stored records",
            values.len() - items.len()
        );
    }
    items
}

/// Reads a payload written by [`build_resume_payload`]. Missing `savedAt` reads as 0.
pub fn parse_resume_payload(data: &Value) -> ResumePayload {
    let parsed = parse_resume_input(data);
    let saved_at = data.get("savedAt").and_then(Value::as_i64).unwrap_or(0);
    ResumePayload {
        username: parsed.username,
        saved_at,
        meta: parsed.meta,
        tweets: parsed.tweets,
    }
}

pub fn build_resume_payload(draft: ResumeDraft) -> ResumePayload {
    ResumePayload {
        username: normalize_username(&draft.username),
        saved_at: draft.saved_at.unwrap_or_else(now_millis),
        meta: draft.meta,
        tweets: draft.tweets,
    }
}

/// Consolidates previously saved and newly collected items.
///
/// Previous items come first; a repeated id is dropped and counted, never overwrites
/// the earlier occurrence.
pub fn merge(
    previous: &[TimelineItem],
    new: &[TimelineItem],
    username: Option<&str>,
) -> MergeOutcome {
    let mut seen = HashSet::with_capacity(previous.len() + new.len());
    let items: Vec<TimelineItem> = previous
        .iter()
        .chain(new)
        .filter(|item| seen.insert(item.id()))
        .cloned()
        .collect();

    let previous_count = previous.len();
    let new_count = new.len();
    let final_count = items.len();
    let meta = ExportMeta {
        username: username.and_then(normalize_username),
        previous_count,
        new_count,
        duplicates_removed: previous_count + new_count - final_count,
        final_count,
    };
    collector_debug!(
        "merged {} previous + {} new -> {} ({} duplicates)",
        previous_count,
        new_count,
        final_count,
        meta.duplicates_removed
    );
    MergeOutcome { items, meta }
}

/// Merges a stored payload (if any) with freshly collected items. The payload's
/// username wins over `fallback_username`.
pub fn merge_with_resume(
    resume: Option<&ResumePayload>,
    collected: &[TimelineItem],
    fallback_username: Option<&str>,
) -> MergeOutcome {
    let previous = resume.map(|payload| payload.tweets.as_slice()).unwrap_or(&[]);
    let username = resume
        .and_then(|payload| payload.username.as_deref())
        .or(fallback_username);
    merge(previous, collected, username)
}
