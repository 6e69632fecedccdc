//! Timeline core: pure collection policy, lifecycle reducer and resume/merge logic.
//!
//! Nothing in this crate performs I/O. State structs are owned by the caller and
//! mutated only through the functions exported here.
mod clock;
mod effect;
mod export;
mod intercept;
mod lifecycle;
mod msg;
mod normalize;
mod projection;
mod rate_limit;
mod resume;
mod session;
mod settings;
mod update;

pub use clock::{now_millis, Millis};
pub use effect::{Effect, PauseReason};
pub use export::{build_export_document, format_timestamp};
pub use intercept::InterceptedResponse;
pub use lifecycle::{
    reduce, should_prompt_looks_done, Action, ActionKind, CompletionPolicy, LifecycleState,
    LooksDoneProbe, Status,
};
pub use msg::Event;
pub use normalize::{extract_timeline_items, normalize, normalize_stored, TimelineItem};
pub use projection::{is_reply, project_minimal};
pub use rate_limit::{
    apply_rate_limit_info, cooldown_duration_ms, end_cooldown, register_rate_limit_hit,
    register_success, reset, CooldownReason, PacingPolicy, RateLimitInfo, RateLimitMode,
    RateLimitOutcome, RateLimitState,
};
pub use resume::{
    build_resume_payload, merge, merge_with_resume, normalize_username, parse_resume_input,
    parse_resume_payload, ExportMeta, MergeOutcome, ParsedResume, ResumeDraft, ResumePayload,
};
pub use session::{Session, SessionView};
pub use settings::{Settings, SettingsPatch};
pub use update::update;
