use std::path::{Path, PathBuf};

use collector_logging::collector_info;
use timeline_core::{build_export_document, project_minimal, Millis, MergeOutcome};

use crate::filename::export_filename;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::ExportSummary;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Project items onto the flat minimal-data record before writing.
    pub minimal_data: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Writes final export documents into one output directory.
#[derive(Debug, Clone)]
pub struct ExportWriter {
    writer: AtomicFileWriter,
}

impl ExportWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(output_dir),
        }
    }

    pub fn output_dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn write(
        &self,
        outcome: &MergeOutcome,
        minimal_data: bool,
        exported_at: Millis,
    ) -> Result<ExportSummary, ExportError> {
        let document = if minimal_data {
            let projected = MergeOutcome {
                items: outcome.items.iter().map(project_minimal).collect(),
                meta: outcome.meta.clone(),
            };
            build_export_document(&projected, exported_at)
        } else {
            build_export_document(outcome, exported_at)
        };

        let filename = export_filename(outcome.meta.username.as_deref(), exported_at);
        let path = self.writer.write_json(&filename, &document)?;
        collector_info!(
            "Wrote export {:?}: {} previous + {} new - {} duplicates = {}",
            path,
            outcome.meta.previous_count,
            outcome.meta.new_count,
            outcome.meta.duplicates_removed,
            outcome.meta.final_count
        );
        Ok(ExportSummary {
            path,
            meta: outcome.meta.clone(),
        })
    }
}

/// Writes an export with the given options; convenience for one-shot callers.
pub fn write_export(
    outcome: &MergeOutcome,
    options: &ExportOptions,
    exported_at: Millis,
) -> Result<ExportSummary, ExportError> {
    ExportWriter::new(options.output_dir.clone()).write(outcome, options.minimal_data, exported_at)
}
