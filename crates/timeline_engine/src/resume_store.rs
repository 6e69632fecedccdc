use std::path::{Path, PathBuf};
use std::sync::Arc;

use collector_logging::{collector_debug, collector_info, collector_warn};
use timeline_core::{normalize_username, now_millis, parse_resume_payload, Millis, ResumePayload};
use tokio::sync::Mutex;

use crate::filename::resume_filename;
use crate::persist::AtomicFileWriter;
use crate::StoreError;

/// Persisted partial progress, scoped by normalized username.
#[async_trait::async_trait]
pub trait ResumeStore: Send + Sync {
    /// Stored payload for `username`, or `None` when absent, expired, unreadable or
    /// belonging to another account.
    async fn load(&self, username: &str) -> Result<Option<ResumePayload>, StoreError>;
    async fn save(&self, payload: &ResumePayload) -> Result<(), StoreError>;
    async fn clear(&self, username: &str) -> Result<(), StoreError>;
}

/// One JSON file per username in a state directory.
pub struct FileResumeStore {
    writer: AtomicFileWriter,
    max_age_ms: Millis,
    clock: Arc<dyn Fn() -> Millis + Send + Sync>,
    write_lock: Mutex<()>,
}

impl FileResumeStore {
    pub fn new(dir: PathBuf, max_age_ms: Millis) -> Self {
        Self::with_clock(dir, max_age_ms, Arc::new(now_millis))
    }

    /// Uses `clock` instead of the wall clock for expiry checks.
    pub fn with_clock(
        dir: PathBuf,
        max_age_ms: Millis,
        clock: Arc<dyn Fn() -> Millis + Send + Sync>,
    ) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            max_age_ms,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, username: &str) -> Option<PathBuf> {
        let username = normalize_username(username)?;
        Some(self.writer.dir().join(resume_filename(&username)))
    }
}

#[async_trait::async_trait]
impl ResumeStore for FileResumeStore {
    async fn load(&self, username: &str) -> Result<Option<ResumePayload>, StoreError> {
        let Some(expected) = normalize_username(username) else {
            return Ok(None);
        };
        let path = self.writer.dir().join(resume_filename(&expected));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(err) => {
                collector_warn!("Failed to parse resume file {:?}: {}", path, err);
                return Ok(None);
            }
        };
        let payload = parse_resume_payload(&value);

        if payload.username.as_deref() != Some(expected.as_str()) {
            collector_warn!(
                "Ignoring resume file {:?}: belongs to {:?}, not {}",
                path,
                payload.username,
                expected
            );
            return Ok(None);
        }

        let age = (self.clock)().saturating_sub(payload.saved_at);
        if age > self.max_age_ms {
            collector_info!("Resume for {} expired ({}ms old); discarding", expected, age);
            remove_if_exists(&path).await?;
            return Ok(None);
        }

        collector_info!(
            "Loaded resume for {} with {} items",
            expected,
            payload.tweets.len()
        );
        Ok(Some(payload))
    }

    async fn save(&self, payload: &ResumePayload) -> Result<(), StoreError> {
        let username = payload
            .username
            .as_deref()
            .ok_or(StoreError::MissingUsername)?;
        let filename = resume_filename(username);
        let content = serde_json::to_vec(payload)?;

        let _guard = self.write_lock.lock().await;
        let writer = self.writer.clone();
        let path = tokio::task::spawn_blocking(move || writer.write(&filename, &content)).await??;
        collector_debug!("Saved {} resume items to {:?}", payload.tweets.len(), path);
        Ok(())
    }

    async fn clear(&self, username: &str) -> Result<(), StoreError> {
        let Some(path) = self.path_for(username) else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&path).await
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
