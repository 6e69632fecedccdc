use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use timeline_core::{CooldownReason, ExportMeta, Millis, PauseReason, SessionView, Status};

use crate::persist::PersistError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("resume payload has no username")]
    MissingUsername,
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// The most recent finished export, as reported over the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastExport {
    pub username: String,
    pub count: usize,
    pub at: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub meta: ExportMeta,
}

/// Progress reported by a collector worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorEvent {
    Started {
        username: String,
        resumed_items: usize,
    },
    /// Sent once after every processed event.
    Progress(SessionView),
    Pacing {
        delay_ms: u64,
    },
    Cooldown {
        reason: CooldownReason,
        duration_ms: u64,
    },
    Paused {
        reason: PauseReason,
        retry_after_ms: Option<u64>,
    },
    LooksDone {
        collected: usize,
    },
    ResumeSaved {
        count: usize,
    },
    ExportWritten(ExportSummary),
    Failed {
        message: String,
    },
    Finished {
        status: Status,
    },
}

impl fmt::Display for CollectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorEvent::Started {
                username,
                resumed_items,
            } => write!(f, "started @{username} ({resumed_items} items resumed)"),
            CollectorEvent::Progress(view) => write!(
                f,
                "{:?}: {} items, {} requests, {}/{} remaining",
                view.status, view.collected, view.request_count, view.remaining, view.limit
            ),
            CollectorEvent::Pacing { delay_ms } => write!(f, "pacing {delay_ms}ms"),
            CollectorEvent::Cooldown {
                reason,
                duration_ms,
            } => write!(f, "cooldown ({reason:?}) for {duration_ms}ms"),
            CollectorEvent::Paused {
                reason,
                retry_after_ms,
            } => match retry_after_ms {
                Some(ms) => write!(f, "paused ({reason:?}), retry after {ms}ms"),
                None => write!(f, "paused ({reason:?})"),
            },
            CollectorEvent::LooksDone { collected } => {
                write!(f, "looks done with {collected} items")
            }
            CollectorEvent::ResumeSaved { count } => write!(f, "resume saved ({count} items)"),
            CollectorEvent::ExportWritten(summary) => write!(
                f,
                "export written to {} ({} items)",
                summary.path.display(),
                summary.meta.final_count
            ),
            CollectorEvent::Failed { message } => write!(f, "failed: {message}"),
            CollectorEvent::Finished { status } => write!(f, "finished ({status:?})"),
        }
    }
}
