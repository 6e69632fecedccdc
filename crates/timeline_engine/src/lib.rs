//! Timeline engine: persistence, export writing, the message bus and the collector
//! worker that executes core effects.
mod bus;
mod collector;
mod export;
mod filename;
mod import;
mod last_export_store;
mod persist;
mod resume_store;
mod settings_store;
mod types;

pub use bus::{Background, BusError, BusRequest, BusResponse, LogEntry, LogLevel, MAX_LOG_ENTRIES};
pub use collector::{CollectorHandle, CollectorSetup};
pub use export::{write_export, ExportError, ExportOptions, ExportWriter};
pub use filename::{export_filename, resume_filename};
pub use import::{import_resume_file, ImportError};
pub use last_export_store::{FileLastExportStore, LastExportStore};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use resume_store::{FileResumeStore, ResumeStore};
pub use settings_store::{FileSettingsStore, SettingsStore};
pub use types::{CollectorEvent, ExportSummary, LastExport, StoreError};
