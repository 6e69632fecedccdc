//! Drives a collector from a recorded capture. Time is virtual: cooldowns and
//! rate-limit pauses are resolved by advancing the clock instead of sleeping.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use collector_logging::{collector_debug, collector_info, collector_warn};
use serde::Deserialize;
use timeline_core::{Event, InterceptedResponse, Millis, PauseReason, Status};
use timeline_engine::{
    ensure_dir, import_resume_file, CollectorEvent, CollectorHandle, CollectorSetup,
    ExportSummary, ExportWriter, FileLastExportStore, FileResumeStore, FileSettingsStore,
};

use crate::config::CollectorConfig;

const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// One line of a capture file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CaptureLine {
    Response {
        at: Millis,
        response: InterceptedResponse,
    },
    Scroll {
        at: Millis,
    },
}

impl CaptureLine {
    fn at(&self) -> Millis {
        match self {
            CaptureLine::Response { at, .. } | CaptureLine::Scroll { at } => *at,
        }
    }
}

pub struct ReplayOptions {
    pub username: String,
    pub capture: PathBuf,
    pub resume_file: Option<PathBuf>,
    pub config: CollectorConfig,
}

#[derive(Debug)]
pub struct ReplayOutcome {
    pub status: Status,
    pub export: Option<ExportSummary>,
    pub lines: usize,
}

/// Blank lines are skipped; anything else must decode.
pub fn read_capture(path: &Path) -> anyhow::Result<Vec<CaptureLine>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading capture {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: bad capture line", path.display(), index + 1))
        })
        .collect()
}

pub fn run_replay(options: ReplayOptions) -> anyhow::Result<ReplayOutcome> {
    let lines = read_capture(&options.capture)?;
    let config = &options.config;
    ensure_dir(&config.state_dir)?;

    let imported = options
        .resume_file
        .as_deref()
        .map(|path| import_resume_file(path, Some(&options.username)))
        .transpose()?;

    let started_at = lines.first().map_or(0, CaptureLine::at);
    let handle = CollectorHandle::start(CollectorSetup {
        username: options.username.clone(),
        pacing: config.pacing.clone(),
        completion: config.completion.clone(),
        resume_store: Arc::new(FileResumeStore::new(
            config.state_dir.clone(),
            config.resume_max_age_ms(),
        )),
        settings_store: Arc::new(FileSettingsStore::new(config.state_dir.clone())),
        last_export_store: Arc::new(FileLastExportStore::new(config.state_dir.clone())),
        export_writer: ExportWriter::new(config.output_dir.clone()),
        imported,
        created_at: started_at,
    });

    let mut driver = Driver::new(handle, started_at);
    driver.dispatch(Event::Start { at: started_at })?;
    for line in &lines {
        if driver.status.is_terminal() {
            collector_info!("Collector finished early; skipping the rest of the capture");
            break;
        }
        driver.clock = driver.clock.max(line.at());
        let at = driver.clock;
        let event = match line {
            CaptureLine::Response { response, .. } => Event::Response {
                response: response.clone(),
                at,
            },
            CaptureLine::Scroll { .. } => Event::Scrolled { at },
        };
        driver.dispatch(event)?;
    }

    if !driver.status.is_terminal() {
        let now = driver.clock.saturating_add(config.completion.idle_threshold_ms);
        driver.clock = now;
        driver.dispatch(Event::IdleCheck {
            now,
            height_stable: true,
        })?;
        driver.dispatch(Event::ConfirmDone { at: now })?;
    }

    let outcome = driver.finish(lines.len());
    if outcome.status != Status::Completed {
        bail!("collection ended as {:?} without an export", outcome.status);
    }
    Ok(outcome)
}

struct Driver {
    handle: CollectorHandle,
    clock: Millis,
    status: Status,
    export: Option<ExportSummary>,
    wake: Option<Event>,
}

impl Driver {
    fn new(handle: CollectorHandle, clock: Millis) -> Self {
        Self {
            handle,
            clock,
            status: Status::Idle,
            export: None,
            wake: None,
        }
    }

    /// Sends `event` and any wake-ups it schedules, one at a time.
    fn dispatch(&mut self, event: Event) -> anyhow::Result<()> {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            self.handle.send(event);
            self.await_progress()?;
            if self.status.is_terminal() {
                break;
            }
            next = self.wake.take();
        }
        Ok(())
    }

    fn await_progress(&mut self) -> anyhow::Result<()> {
        loop {
            let event = self
                .handle
                .recv_timeout(RECV_TIMEOUT)
                .ok_or_else(|| anyhow!("collector stopped responding"))?;
            collector_debug!("{}", event);
            match event {
                CollectorEvent::Progress(view) => {
                    self.status = view.status;
                    return Ok(());
                }
                CollectorEvent::Cooldown { duration_ms, .. } => {
                    collector_info!("{}", event);
                    self.advance(duration_ms);
                    self.wake = Some(Event::CooldownElapsed { at: self.clock });
                }
                CollectorEvent::Paused {
                    reason,
                    retry_after_ms,
                } => {
                    if reason == PauseReason::AuthExpired {
                        collector_warn!("Capture contains an auth failure; resuming anyway");
                    }
                    self.advance(retry_after_ms.unwrap_or(0));
                    self.wake = Some(Event::ManualResume { at: self.clock });
                }
                CollectorEvent::LooksDone { collected } => {
                    collector_info!("Timeline looks done at {} items", collected);
                }
                CollectorEvent::ExportWritten(summary) => {
                    collector_info!("Export written to {}", summary.path.display());
                    self.export = Some(summary);
                }
                CollectorEvent::Failed { message } => {
                    collector_warn!("Collector reported: {}", message);
                }
                _ => {}
            }
        }
    }

    fn advance(&mut self, duration_ms: u64) {
        let step = Millis::try_from(duration_ms).unwrap_or(Millis::MAX);
        self.clock = self.clock.saturating_add(step);
    }

    fn finish(self, lines: usize) -> ReplayOutcome {
        let Driver {
            handle,
            status,
            export,
            ..
        } = self;
        handle.shutdown();
        ReplayOutcome {
            status,
            export,
            lines,
        }
    }
}
