//! Export lifecycle state machine and the "looks done" completion heuristic.

use collector_logging::{collector_debug, collector_trace};
use serde::{Deserialize, Serialize};

use crate::clock::{now_millis, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Idle,
    Running,
    Cooldown,
    PausedRateLimit,
    PendingDone,
    Completed,
    Cancelled,
}

impl Status {
    /// No action leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub status: Status,
    pub last_activity_at: Millis,
}

impl LifecycleState {
    pub fn new(created_at: Millis) -> Self {
        Self {
            status: Status::Idle,
            last_activity_at: created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Start,
    Activity,
    EnterCooldown,
    ExitCooldown,
    PauseRateLimit,
    ResumeManual,
    MarkPendingDone,
    Complete,
    Cancel,
}

/// Reducer input. Without a timestamp the wall clock at reduction time is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub at: Option<Millis>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, at: None }
    }

    pub fn at(kind: ActionKind, at: Millis) -> Self {
        Self { kind, at: Some(at) }
    }
}

/// Pure reducer over lifecycle actions. Undefined transitions leave the state as is.
pub fn reduce(state: LifecycleState, action: Action) -> LifecycleState {
    let at = || action.at.unwrap_or_else(now_millis);
    let next = match (state.status, action.kind) {
        (status, _) if status.is_terminal() => state,
        (Status::Idle, ActionKind::Start) => LifecycleState {
            status: Status::Running,
            last_activity_at: at(),
        },
        (Status::Running, ActionKind::Activity) => LifecycleState {
            last_activity_at: at(),
            ..state
        },
        (Status::Running, ActionKind::EnterCooldown) => LifecycleState {
            status: Status::Cooldown,
            ..state
        },
        // Resuming restarts the idle clock so time spent waiting never counts as idleness.
        (Status::Cooldown, ActionKind::ExitCooldown)
        | (Status::PausedRateLimit, ActionKind::ResumeManual) => LifecycleState {
            status: Status::Running,
            last_activity_at: at(),
        },
        (Status::Running, ActionKind::PauseRateLimit) => LifecycleState {
            status: Status::PausedRateLimit,
            ..state
        },
        (Status::Running, ActionKind::MarkPendingDone) => LifecycleState {
            status: Status::PendingDone,
            ..state
        },
        (Status::PendingDone, ActionKind::Complete) => LifecycleState {
            status: Status::Completed,
            ..state
        },
        (_, ActionKind::Cancel) => LifecycleState {
            status: Status::Cancelled,
            ..state
        },
        _ => state,
    };

    if next.status != state.status {
        collector_debug!(
            "lifecycle {:?} --{:?}--> {:?}",
            state.status,
            action.kind,
            next.status
        );
    } else if next == state {
        collector_trace!("lifecycle ignored {:?} in {:?}", action.kind, state.status);
    }
    next
}

/// Completion heuristic tuning values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionPolicy {
    pub idle_threshold_ms: i64,
    /// Scroll steps that must be exceeded before completion is ever suggested.
    pub scroll_floor: u32,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 20_000,
            scroll_floor: 3,
        }
    }
}

impl CompletionPolicy {
    pub fn probe(
        &self,
        now: Millis,
        scroll_count: u32,
        responses_captured: u32,
        height_stable: bool,
    ) -> LooksDoneProbe {
        LooksDoneProbe {
            now,
            idle_threshold_ms: self.idle_threshold_ms,
            scroll_floor: self.scroll_floor,
            scroll_count,
            responses_captured,
            height_stable,
        }
    }
}

/// Observations polled by the caller when checking for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooksDoneProbe {
    pub now: Millis,
    pub idle_threshold_ms: i64,
    pub scroll_floor: u32,
    pub scroll_count: u32,
    pub responses_captured: u32,
    pub height_stable: bool,
}

/// Heuristic end-of-feed signal. Only ever true while actively running.
pub fn should_prompt_looks_done(state: &LifecycleState, probe: &LooksDoneProbe) -> bool {
    state.status == Status::Running
        && probe.now.saturating_sub(state.last_activity_at) >= probe.idle_threshold_ms
        && probe.scroll_count > probe.scroll_floor
        && probe.responses_captured > 0
        && probe.height_stable
}
