use serde_json::{json, Map, Value};

use crate::normalize::{normalize_stored, TimelineItem};

/// True when the item answers another post.
pub fn is_reply(item: &TimelineItem) -> bool {
    let payload = item.payload();
    let reply_to = payload
        .pointer("/legacy/in_reply_to_status_id_str")
        .or_else(|| payload.get("in_reply_to_status_id"));
    matches!(reply_to, Some(Value::String(id)) if !id.is_empty())
}

/// Projects a captured node onto the flat minimal-data record. Records that are
/// already flat are returned unchanged.
pub fn project_minimal(item: &TimelineItem) -> TimelineItem {
    let payload = item.payload();
    let Some(legacy) = payload.get("legacy").and_then(Value::as_object) else {
        return item.clone();
    };

    let text = payload
        .pointer("/note_tweet/note_tweet_results/result/text")
        .or_else(|| legacy.get("full_text"))
        .cloned()
        .unwrap_or(Value::Null);
    let user = payload.pointer("/core/user_results/result");
    let user_field = |key: &str| {
        user.and_then(|u| u.pointer(&format!("/core/{key}")))
            .or_else(|| user.and_then(|u| u.pointer(&format!("/legacy/{key}"))))
            .cloned()
            .unwrap_or(Value::Null)
    };
    let view_count = payload
        .pointer("/views/count")
        .and_then(Value::as_str)
        .and_then(|count| count.parse::<u64>().ok());

    let record = json!({
        "id": item.id(),
        "text": text,
        "created_at": field(legacy, "created_at"),
        "lang": field(legacy, "lang"),
        "author": {
            "id": user.and_then(|u| u.get("rest_id")).cloned().unwrap_or(Value::Null),
            "screen_name": user_field("screen_name"),
            "name": user_field("name"),
        },
        "reply_count": field(legacy, "reply_count"),
        "retweet_count": field(legacy, "retweet_count"),
        "favorite_count": field(legacy, "favorite_count"),
        "quote_count": field(legacy, "quote_count"),
        "bookmark_count": field(legacy, "bookmark_count"),
        "view_count": view_count,
        "in_reply_to_status_id": field(legacy, "in_reply_to_status_id_str"),
        "conversation_id": field(legacy, "conversation_id_str"),
        "is_retweet": legacy.contains_key("retweeted_status_result"),
        "is_quote": legacy.get("is_quote_status").and_then(Value::as_bool).unwrap_or(false),
        "urls": expanded_urls(legacy),
        "media": media(legacy),
    });
    normalize_stored(&record).unwrap_or_else(|| item.clone())
}

fn field(map: &Map<String, Value>, key: &str) -> Value {
    map.get(key).cloned().unwrap_or(Value::Null)
}

fn expanded_urls(legacy: &Map<String, Value>) -> Vec<Value> {
    legacy
        .get("entities")
        .and_then(|entities| entities.get("urls"))
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(|url| url.get("expanded_url").cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn media(legacy: &Map<String, Value>) -> Vec<Value> {
    let Some(entries) = legacy
        .get("extended_entities")
        .and_then(|entities| entities.get("media"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|entry| {
            json!({
                "type": entry.get("type").cloned().unwrap_or(Value::Null),
                "url": best_media_url(entry),
            })
        })
        .collect()
}

/// Highest-bitrate video variant when present, the still image otherwise.
fn best_media_url(entry: &Value) -> Value {
    let best_variant = entry
        .pointer("/video_info/variants")
        .and_then(Value::as_array)
        .and_then(|variants| {
            variants
                .iter()
                .filter(|variant| variant.get("bitrate").is_some())
                .max_by_key(|variant| variant.get("bitrate").and_then(Value::as_u64).unwrap_or(0))
        })
        .and_then(|variant| variant.get("url"));
    best_variant
        .or_else(|| entry.get("media_url_https"))
        .cloned()
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn captured() -> TimelineItem {
        normalize(&json!({
            "__typename": "Tweet",
            "rest_id": "100",
            "core": {"user_results": {"result": {
                "rest_id": "7",
                "legacy": {"screen_name": "alice", "name": "Alice"}
            }}},
            "views": {"count": "1500"},
            "legacy": {
                "full_text": "hello world",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "lang": "en",
                "favorite_count": 3,
                "in_reply_to_status_id_str": "99",
                "entities": {"urls": [{"expanded_url": "https://example.com"}]},
                "extended_entities": {"media": [{
                    "type": "video",
                    "media_url_https": "https://img/1.jpg",
                    "video_info": {"variants": [
                        {"content_type": "application/x-mpegURL", "url": "https://v/playlist"},
                        {"bitrate": 256000, "url": "https://v/low.mp4"},
                        {"bitrate": 832000, "url": "https://v/high.mp4"}
                    ]}
                }]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn projects_captured_node_to_flat_record() {
        let minimal = project_minimal(&captured());
        let record = minimal.payload();
        assert_eq!(minimal.id(), "100");
        assert_eq!(record["text"], "hello world");
        assert_eq!(record["author"]["screen_name"], "alice");
        assert_eq!(record["author"]["id"], "7");
        assert_eq!(record["view_count"], 1500);
        assert_eq!(record["urls"], json!(["https://example.com"]));
        assert_eq!(record["media"][0]["url"], "https://v/high.mp4");
        assert!(is_reply(&minimal));
    }

    #[test]
    fn flat_records_pass_through() {
        let flat = normalize_stored(&json!({"id": "5", "text": "x"})).unwrap();
        assert_eq!(project_minimal(&flat), flat);
        assert!(!is_reply(&flat));
    }

    #[test]
    fn reply_detection_reads_legacy_field() {
        assert!(is_reply(&captured()));
        let original = normalize(&json!({"__typename": "Tweet", "rest_id": "1", "legacy": {}})).unwrap();
        assert!(!is_reply(&original));
    }
}
