use std::path::PathBuf;

use collector_logging::{collector_debug, collector_warn};
use tokio::sync::Mutex;

use crate::persist::AtomicFileWriter;
use crate::{LastExport, StoreError};

const LAST_EXPORT_FILENAME: &str = "last_export.json";

/// Remembers the most recent finished export across processes.
#[async_trait::async_trait]
pub trait LastExportStore: Send + Sync {
    async fn load(&self) -> Result<Option<LastExport>, StoreError>;
    async fn record(&self, export: &LastExport) -> Result<(), StoreError>;
}

/// `last_export.json` in the state directory. Missing or unreadable files read as
/// no export.
pub struct FileLastExportStore {
    writer: AtomicFileWriter,
    lock: Mutex<()>,
}

impl FileLastExportStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(LAST_EXPORT_FILENAME)
    }
}

#[async_trait::async_trait]
impl LastExportStore for FileLastExportStore {
    async fn load(&self) -> Result<Option<LastExport>, StoreError> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(export) => Ok(Some(export)),
            Err(err) => {
                collector_warn!("Failed to parse last export from {:?}: {}", path, err);
                Ok(None)
            }
        }
    }

    async fn record(&self, export: &LastExport) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let writer = self.writer.clone();
        let saved = export.clone();
        tokio::task::spawn_blocking(move || writer.write_json(LAST_EXPORT_FILENAME, &saved))
            .await??;
        collector_debug!("Recorded last export {:?}", export);
        Ok(())
    }
}
