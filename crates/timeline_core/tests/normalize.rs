use serde_json::{json, Value};
use timeline_core::{extract_timeline_items, normalize};

#[test]
fn direct_tweet_is_returned_unchanged() {
    let raw = json!({"__typename": "Tweet", "rest_id": "1", "legacy": {"full_text": "hi"}});
    let item = normalize(&raw).expect("direct node");
    assert_eq!(item.id(), "1");
    assert_eq!(item.type_name(), Some("Tweet"));
    assert_eq!(item.payload(), &raw);
}

#[test]
fn visibility_wrapper_is_unwrapped() {
    let raw = json!({
        "__typename": "TweetWithVisibilityResults",
        "tweet": {"__typename": "Tweet", "rest_id": "9"}
    });
    let item = normalize(&raw).expect("wrapped node");
    assert_eq!(item.payload(), &json!({"__typename": "Tweet", "rest_id": "9"}));
    assert_eq!(item.id(), "9");
}

#[test]
fn untagged_wrapped_node_is_tagged_as_direct() {
    let raw = json!({
        "__typename": "TweetWithVisibilityResults",
        "tweet": {"rest_id": "77", "legacy": {"full_text": "hi"}}
    });
    let item = normalize(&raw).expect("wrapped node");
    assert_eq!(
        item.payload(),
        &json!({"__typename": "Tweet", "rest_id": "77", "legacy": {"full_text": "hi"}})
    );
    assert_eq!(normalize(item.payload()), Some(item.clone()));
}

#[test]
fn visibility_wrapper_without_nested_node_is_dropped() {
    assert!(normalize(&json!({"__typename": "TweetWithVisibilityResults"})).is_none());
    assert!(normalize(&json!({"__typename": "TweetWithVisibilityResults", "tweet": null})).is_none());
}

#[test]
fn normalize_is_total() {
    let inputs: Vec<Value> = vec![
        Value::Null,
        json!(true),
        json!(42),
        json!("Tweet"),
        json!([{"__typename": "Tweet", "rest_id": "1"}]),
        json!({}),
        json!({"__typename": 7}),
        json!({"__typename": "TweetTombstone", "tombstone": {}}),
        json!({"__typename": "TweetUnavailable"}),
        json!({"__typename": "SomethingNew", "rest_id": "3"}),
    ];
    for input in inputs {
        assert!(normalize(&input).is_none(), "expected None for {input}");
    }
}

#[test]
fn extracts_items_from_timeline_response_in_order() {
    let body = json!({"data": {"user": {"result": {"timeline_v2": {"timeline": {"instructions": [
        {"type": "TimelineClearCache"},
        {"type": "TimelineAddEntries", "entries": [
            {"entryId": "tweet-1", "content": {"itemContent": {"tweet_results": {"result":
                {"__typename": "Tweet", "rest_id": "1"}}}}},
            {"entryId": "promoted-tweet-55", "content": {"itemContent": {"tweet_results": {"result":
                {"__typename": "Tweet", "rest_id": "55"}}}}},
            {"entryId": "tweet-2", "content": {"itemContent": {"tweet_results": {"result":
                {"__typename": "TweetWithVisibilityResults",
                 "tweet": {"__typename": "Tweet", "rest_id": "2"}}}}}},
            {"entryId": "tweet-3", "content": {"itemContent": {"tweet_results": {"result":
                {"__typename": "TweetTombstone"}}}}},
            {"entryId": "profile-conversation-4", "content": {"items": [
                {"item": {"itemContent": {"tweet_results": {"result":
                    {"__typename": "Tweet", "rest_id": "4"}}}}},
                {"item": {"itemContent": {"tweet_results": {"result":
                    {"__typename": "Tweet", "rest_id": "5"}}}}}
            ]}},
            {"entryId": "cursor-bottom-0", "content": {"value": "abc"}}
        ]}
    ]}}}}}});

    let ids: Vec<String> = extract_timeline_items(&body)
        .iter()
        .map(|item| item.id().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2", "4", "5"]);
}

#[test]
fn quoted_tweets_are_not_collected_separately() {
    let body = json!({"entries": [{"content": {"itemContent": {"tweet_results": {"result": {
        "__typename": "Tweet",
        "rest_id": "10",
        "quoted_status_result": {"result": {"__typename": "Tweet", "rest_id": "11"}}
    }}}}}]});
    let items = extract_timeline_items(&body);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id(), "10");
}

#[test]
fn non_timeline_bodies_yield_nothing() {
    assert!(extract_timeline_items(&json!({"errors": [{"message": "nope"}]})).is_empty());
    assert!(extract_timeline_items(&Value::Null).is_empty());
}
