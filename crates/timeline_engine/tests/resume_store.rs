use std::fs;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Once};

use serde_json::json;
use tempfile::TempDir;
use timeline_core::{build_resume_payload, normalize_stored, ResumeDraft, TimelineItem};
use timeline_engine::{FileResumeStore, ResumeStore, StoreError};

const HOUR_MS: i64 = 60 * 60 * 1000;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(collector_logging::initialize_for_tests);
}

fn item(id: &str) -> TimelineItem {
    normalize_stored(&json!({"id": id, "text": format!("post {id}")})).unwrap()
}

fn draft(username: &str, ids: &[&str], saved_at: i64) -> ResumeDraft {
    ResumeDraft {
        username: username.to_string(),
        tweets: ids.iter().map(|id| item(id)).collect(),
        meta: None,
        saved_at: Some(saved_at),
    }
}

fn store_at(temp: &TempDir, now: Arc<AtomicI64>) -> FileResumeStore {
    FileResumeStore::with_clock(
        temp.path().to_path_buf(),
        72 * HOUR_MS,
        Arc::new(move || now.load(Ordering::SeqCst)),
    )
}

#[tokio::test]
async fn save_then_load_same_user() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let now = Arc::new(AtomicI64::new(1_000));
    let store = store_at(&temp, now);

    let payload = build_resume_payload(draft("@Alice", &["1", "2"], 1_000));
    store.save(&payload).await.unwrap();

    let loaded = store.load("alice").await.unwrap().expect("resume present");
    assert_eq!(loaded.username.as_deref(), Some("alice"));
    let ids: Vec<&str> = loaded.tweets.iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(loaded.saved_at, 1_000);
}

#[tokio::test]
async fn missing_file_loads_as_none() {
    let temp = TempDir::new().unwrap();
    let store = FileResumeStore::new(temp.path().to_path_buf(), HOUR_MS);
    assert!(store.load("nobody").await.unwrap().is_none());
    assert!(store.load("  @ ").await.unwrap().is_none());
}

#[tokio::test]
async fn other_users_file_is_ignored() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let now = Arc::new(AtomicI64::new(1_000));
    let store = store_at(&temp, now);

    // A file named for bob but carrying alice's payload.
    let path = store.path_for("bob").unwrap();
    fs::write(
        &path,
        serde_json::to_vec(&build_resume_payload(draft("alice", &["1"], 1_000))).unwrap(),
    )
    .unwrap();

    assert!(store.load("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_resume_is_discarded() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let now = Arc::new(AtomicI64::new(0));
    let store = store_at(&temp, now.clone());

    store
        .save(&build_resume_payload(draft("alice", &["1"], 0)))
        .await
        .unwrap();

    now.store(72 * HOUR_MS, Ordering::SeqCst);
    assert!(store.load("alice").await.unwrap().is_some());

    now.store(72 * HOUR_MS + 1, Ordering::SeqCst);
    assert!(store.load("alice").await.unwrap().is_none());
    assert!(!store.path_for("alice").unwrap().exists());
}

#[tokio::test]
async fn corrupt_file_loads_as_none() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let store = FileResumeStore::new(temp.path().to_path_buf(), HOUR_MS);
    fs::write(store.path_for("alice").unwrap(), "{not json").unwrap();
    assert!(store.load("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn clear_removes_file_and_tolerates_absence() {
    let temp = TempDir::new().unwrap();
    let now = Arc::new(AtomicI64::new(5));
    let store = store_at(&temp, now);

    store
        .save(&build_resume_payload(draft("alice", &["1"], 5)))
        .await
        .unwrap();
    assert!(store.path_for("alice").unwrap().exists());

    store.clear("@ALICE").await.unwrap();
    assert!(!store.path_for("alice").unwrap().exists());
    store.clear("alice").await.unwrap();
}

#[tokio::test]
async fn save_without_username_fails() {
    let temp = TempDir::new().unwrap();
    let store = FileResumeStore::new(temp.path().to_path_buf(), HOUR_MS);
    let payload = build_resume_payload(draft("   ", &["1"], 0));
    assert!(payload.username.is_none());
    assert!(matches!(
        store.save(&payload).await,
        Err(StoreError::MissingUsername)
    ));
}
