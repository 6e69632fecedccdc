use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Once};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use timeline_core::{
    build_resume_payload, normalize_stored, CompletionPolicy, Event, InterceptedResponse,
    PacingPolicy, ResumeDraft, Status,
};
use timeline_engine::{
    CollectorEvent, CollectorHandle, CollectorSetup, ExportWriter, FileLastExportStore,
    FileResumeStore, FileSettingsStore, LastExportStore, ResumeStore,
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(collector_logging::initialize_for_tests);
}

struct Dirs {
    state: TempDir,
    output: TempDir,
}

impl Dirs {
    fn new() -> Self {
        Self {
            state: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
        }
    }

    fn resume_store(&self) -> Arc<FileResumeStore> {
        Arc::new(FileResumeStore::new(self.state.path().to_path_buf(), DAY_MS))
    }

    fn last_export_store(&self) -> Arc<FileLastExportStore> {
        Arc::new(FileLastExportStore::new(self.state.path().to_path_buf()))
    }

    fn start(&self) -> CollectorHandle {
        CollectorHandle::start(CollectorSetup {
            username: "@Alice".to_string(),
            pacing: PacingPolicy::default(),
            completion: CompletionPolicy::default(),
            resume_store: self.resume_store(),
            settings_store: Arc::new(FileSettingsStore::new(self.state.path().to_path_buf())),
            last_export_store: self.last_export_store(),
            export_writer: ExportWriter::new(self.output.path().to_path_buf()),
            imported: None,
            created_at: 0,
        })
    }
}

fn tweet(id: &str) -> Value {
    json!({"entryId": format!("tweet-{id}"), "content": {"itemContent": {"tweet_results": {"result": {
        "__typename": "Tweet", "rest_id": id, "legacy": {"full_text": format!("post {id}")}
    }}}}})
}

fn page_response(ids: &[&str]) -> InterceptedResponse {
    let entries: Vec<Value> = ids.iter().map(|id| tweet(id)).collect();
    let mut headers = BTreeMap::new();
    headers.insert("x-rate-limit-limit".to_string(), "150".to_string());
    headers.insert("x-rate-limit-remaining".to_string(), "140".to_string());
    headers.insert("x-rate-limit-reset".to_string(), "0".to_string());
    InterceptedResponse {
        url: "https://example.test/UserTweets".to_string(),
        status: 200,
        headers,
        body: Some(json!({"data": {"timeline": {"instructions": [{"entries": entries}]}}})),
    }
}

fn drain_until_finished(handle: &CollectorHandle) -> Vec<CollectorEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.recv_timeout(Duration::from_secs(5)) {
        let done = matches!(event, CollectorEvent::Finished { .. });
        events.push(event);
        if done {
            break;
        }
    }
    events
}

fn export_summary(events: &[CollectorEvent]) -> &timeline_engine::ExportSummary {
    events
        .iter()
        .find_map(|event| match event {
            CollectorEvent::ExportWritten(summary) => Some(summary),
            _ => None,
        })
        .expect("export written")
}

#[test]
fn collects_and_exports_on_confirm() {
    init_logging();
    let dirs = Dirs::new();
    let handle = dirs.start();

    handle.send(Event::Start { at: 1 });
    handle.send(Event::Response {
        response: page_response(&["1", "2"]),
        at: 2,
    });
    handle.send(Event::ConfirmDone { at: 3 });
    let events = drain_until_finished(&handle);
    handle.shutdown();

    assert!(matches!(
        events.first(),
        Some(CollectorEvent::Started { resumed_items: 0, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(CollectorEvent::Finished {
            status: Status::Completed
        })
    ));
    let progress = events
        .iter()
        .filter(|event| matches!(event, CollectorEvent::Progress(_)))
        .count();
    assert_eq!(progress, 3);

    let summary = export_summary(&events);
    assert_eq!(summary.meta.final_count, 2);
    assert_eq!(summary.meta.username.as_deref(), Some("alice"));
    let file_name = summary.path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("alice_timeline_"));

    let document: Value = serde_json::from_str(&fs::read_to_string(&summary.path).unwrap()).unwrap();
    assert_eq!(document["items"][0]["id"], json!("1"));
    assert_eq!(document["items"][0]["text"], json!("post 1"));
    assert_eq!(document["meta"]["finalCount"], json!(2));

    let last = tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(dirs.last_export_store().load())
        .unwrap()
        .expect("last export recorded");
    assert_eq!(last.username, "alice");
    assert_eq!(last.count, 2);
}

#[test]
fn stored_resume_is_merged_then_cleared() {
    init_logging();
    let dirs = Dirs::new();
    let store = dirs.resume_store();
    let previous = build_resume_payload(ResumeDraft {
        username: "alice".to_string(),
        tweets: vec![normalize_stored(&json!({"id": "1", "text": "post 1"})).unwrap()],
        meta: None,
        saved_at: None,
    });
    tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(store.save(&previous))
        .unwrap();

    let handle = dirs.start();
    handle.send(Event::Start { at: 1 });
    handle.send(Event::Response {
        response: page_response(&["1", "2"]),
        at: 2,
    });
    handle.send(Event::ConfirmDone { at: 3 });
    let events = drain_until_finished(&handle);
    handle.shutdown();

    assert!(matches!(
        events.first(),
        Some(CollectorEvent::Started { resumed_items: 1, .. })
    ));
    let meta = &export_summary(&events).meta;
    assert_eq!(meta.previous_count, 1);
    assert_eq!(meta.new_count, 2);
    assert_eq!(meta.duplicates_removed, 1);
    assert_eq!(meta.final_count, 2);

    assert!(!store.path_for("alice").unwrap().exists());
}

#[test]
fn cancel_keeps_progress_for_later() {
    init_logging();
    let dirs = Dirs::new();
    let handle = dirs.start();

    handle.send(Event::Start { at: 1 });
    handle.send(Event::Response {
        response: page_response(&["9"]),
        at: 2,
    });
    handle.send(Event::Cancel { at: 3 });
    let events = drain_until_finished(&handle);
    handle.shutdown();

    assert!(events
        .iter()
        .any(|event| matches!(event, CollectorEvent::ResumeSaved { count: 1 })));
    assert!(matches!(
        events.last(),
        Some(CollectorEvent::Finished {
            status: Status::Cancelled
        })
    ));
    assert!(!events
        .iter()
        .any(|event| matches!(event, CollectorEvent::ExportWritten(_))));
    assert!(dirs.resume_store().path_for("alice").unwrap().exists());
    assert!(!dirs.last_export_store().path().exists());
}

#[test]
fn rate_limit_pause_persists_resume() {
    init_logging();
    let dirs = Dirs::new();
    let handle = dirs.start();

    handle.send(Event::Start { at: 1 });
    handle.send(Event::Response {
        response: page_response(&["4"]),
        at: 2,
    });
    let mut limited = page_response(&[]);
    limited.status = 429;
    limited.body = None;
    handle.send(Event::Response {
        response: limited,
        at: 3,
    });
    handle.send(Event::Cancel { at: 4 });
    let events = drain_until_finished(&handle);
    handle.shutdown();

    assert!(events.iter().any(|event| matches!(
        event,
        CollectorEvent::Paused {
            retry_after_ms: Some(30_000),
            ..
        }
    )));
    let saves = events
        .iter()
        .filter(|event| matches!(event, CollectorEvent::ResumeSaved { .. }))
        .count();
    assert_eq!(saves, 2);
}
