use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

const TYPE_TAG: &str = "__typename";
const DIRECT_TYPE: &str = "Tweet";
const WRAPPED_TYPE: &str = "TweetWithVisibilityResults";
const WRAPPED_FIELD: &str = "tweet";
const PROMOTED_ENTRY_PREFIX: &str = "promoted-";

/// One captured content unit in canonical shape.
///
/// Items are only built by the functions in this module, so every item carries a
/// non-empty id. Two items are the same item iff their ids match.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    id: String,
    type_name: Option<String>,
    payload: Value,
}

impl TimelineItem {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

impl Serialize for TimelineItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

/// Canonicalizes a captured response node.
///
/// Direct content nodes are returned unchanged, visibility wrappers are unwrapped one
/// level, and everything else (placeholders, tombstones, malformed nodes) is dropped.
pub fn normalize(raw: &Value) -> Option<TimelineItem> {
    let node = raw.as_object()?;
    match node.get(TYPE_TAG)?.as_str()? {
        DIRECT_TYPE => content_item(node),
        WRAPPED_TYPE => {
            let inner = node.get(WRAPPED_FIELD)?.as_object()?;
            match inner.get(TYPE_TAG) {
                None => content_item(inner),
                Some(tag) if tag.as_str() == Some(DIRECT_TYPE) => content_item(inner),
                Some(_) => None,
            }
        }
        _ => None,
    }
}

/// Canonicalizes a record read back from a previous export or resume payload.
///
/// Accepts anything `normalize` accepts, plus flat records carrying their own `id`
/// (the minimal-data shape).
pub fn normalize_stored(raw: &Value) -> Option<TimelineItem> {
    if let Some(item) = normalize(raw) {
        return Some(item);
    }
    let record = raw.as_object()?;
    let id = id_field(record.get("id"))?;
    Some(TimelineItem {
        id,
        type_name: record
            .get(TYPE_TAG)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        payload: raw.clone(),
    })
}

/// Collects every normalizable timeline node in a captured response body, in
/// document order. Promoted entries are skipped.
pub fn extract_timeline_items(body: &Value) -> Vec<TimelineItem> {
    let mut items = Vec::new();
    walk(body, &mut items);
    items
}

fn walk(value: &Value, out: &mut Vec<TimelineItem>) {
    match value {
        Value::Object(map) => {
            if is_promoted_entry(map) {
                return;
            }
            for (key, child) in map {
                if key == "tweet_results" {
                    if let Some(item) = child.get("result").and_then(normalize) {
                        out.push(item);
                    }
                    continue;
                }
                walk(child, out);
            }
        }
        Value::Array(values) => {
            for child in values {
                walk(child, out);
            }
        }
        _ => {}
    }
}

fn is_promoted_entry(map: &Map<String, Value>) -> bool {
    map.get("entryId")
        .and_then(Value::as_str)
        .is_some_and(|id| id.starts_with(PROMOTED_ENTRY_PREFIX))
}

fn content_item(node: &Map<String, Value>) -> Option<TimelineItem> {
    let id = id_field(node.get("rest_id"))
        .or_else(|| id_field(node.get("legacy").and_then(|legacy| legacy.get("id_str"))))?;
    // Untagged inner nodes get the direct tag so stored payloads re-normalize.
    let mut payload = node.clone();
    payload
        .entry(TYPE_TAG)
        .or_insert_with(|| Value::String(DIRECT_TYPE.to_string()));
    Some(TimelineItem {
        id,
        type_name: Some(DIRECT_TYPE.to_string()),
        payload: Value::Object(payload),
    })
}

fn id_field(value: Option<&Value>) -> Option<String> {
    let id = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}
