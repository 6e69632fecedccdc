use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::clock::Millis;
use crate::resume::MergeOutcome;

/// RFC 3339 rendering of an epoch-millisecond timestamp.
pub fn format_timestamp(at: Millis) -> String {
    DateTime::<Utc>::from_timestamp_millis(at)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Final export document: merge counters plus the consolidated items.
pub fn build_export_document(outcome: &MergeOutcome, exported_at: Millis) -> Value {
    let meta = &outcome.meta;
    json!({
        "meta": {
            "username": meta.username,
            "previousCount": meta.previous_count,
            "newCount": meta.new_count,
            "duplicatesRemoved": meta.duplicates_removed,
            "finalCount": meta.final_count,
            "exportedAt": format_timestamp(exported_at),
        },
        "items": outcome.items,
    })
}
