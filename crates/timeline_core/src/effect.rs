use crate::CooldownReason;

/// Side effects requested by [`crate::update`]; executed by the collector worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Wait this long between page steps from now on.
    SetPacing { delay_ms: u64 },
    /// Stop paging until `CooldownElapsed` is delivered.
    BeginCooldown {
        reason: CooldownReason,
        duration_ms: u64,
    },
    /// Collection is blocked until the user resumes it.
    PauseForRateLimit {
        reason: PauseReason,
        retry_after_ms: Option<u64>,
    },
    /// Checkpoint collected items to the resume store.
    PersistResume,
    /// Ask the user whether collection looks finished.
    PromptLooksDone { collected: usize },
    /// Merge with the stored resume and write the final export.
    FinalizeExport,
    /// Drop the stored resume after a successful export.
    ClearResume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    RateLimited,
    AuthExpired,
}
