use std::path::PathBuf;

use collector_logging::{collector_debug, collector_warn};
use timeline_core::{Settings, SettingsPatch};
use tokio::sync::Mutex;

use crate::persist::AtomicFileWriter;
use crate::StoreError;

const SETTINGS_FILENAME: &str = "settings.json";

#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> Result<Settings, StoreError>;
    async fn set(&self, patch: SettingsPatch) -> Result<(), StoreError>;
}

/// Settings kept as `settings.json` in the state directory. Missing or unreadable
/// files read as the defaults.
pub struct FileSettingsStore {
    writer: AtomicFileWriter,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(SETTINGS_FILENAME)
    }

    async fn read(&self) -> Result<Settings, StoreError> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Settings::default());
            }
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                collector_warn!("Failed to parse settings from {:?}: {}", path, err);
                Ok(Settings::default())
            }
        }
    }
}

#[async_trait::async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self) -> Result<Settings, StoreError> {
        self.read().await
    }

    async fn set(&self, patch: SettingsPatch) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read().await?;
        settings.apply(&patch);

        let writer = self.writer.clone();
        let saved = settings.clone();
        tokio::task::spawn_blocking(move || writer.write_json(SETTINGS_FILENAME, &saved)).await??;
        collector_debug!("Saved settings {:?}", settings);
        Ok(())
    }
}
