use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use collector_logging::collector_info;
use serde::{Deserialize, Serialize};
use timeline_core::{CompletionPolicy, Millis, PacingPolicy};

const HOUR_MS: Millis = 60 * 60 * 1000;

/// Tunables for a collection run, read from an optional RON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub pacing: PacingPolicy,
    pub completion: CompletionPolicy,
    /// Stored resumes older than this are discarded on load.
    pub resume_max_age_hours: u32,
    pub state_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            pacing: PacingPolicy::default(),
            completion: CompletionPolicy::default(),
            resume_max_age_hours: 72,
            state_dir: PathBuf::from(".timeline_state"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl CollectorConfig {
    pub fn resume_max_age_ms(&self) -> Millis {
        Millis::from(self.resume_max_age_hours) * HOUR_MS
    }

    /// Command-line directories win over the file.
    pub fn with_overrides(mut self, state_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = state_dir {
            self.state_dir = dir;
        }
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        self
    }
}

/// Defaults when no path is given; a given path must exist and parse.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CollectorConfig> {
    let Some(path) = path else {
        return Ok(CollectorConfig::default());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: CollectorConfig =
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    collector_info!("Loaded config from {:?}", path);
    Ok(config)
}
