use std::collections::HashSet;

use crate::{
    normalize_username, CompletionPolicy, LifecycleState, Millis, PacingPolicy, RateLimitState,
    Settings, Status, TimelineItem,
};

/// All mutable state of one collection session. Owned by a single dispatcher and
/// changed only through [`crate::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    username: String,
    settings: Settings,
    pacing: PacingPolicy,
    completion: CompletionPolicy,
    rate: RateLimitState,
    lifecycle: LifecycleState,
    collected: Vec<TimelineItem>,
    seen: HashSet<String>,
    responses_captured: u32,
    scroll_count: u32,
    replies_skipped: usize,
    duplicates_skipped: usize,
}

/// Read-only snapshot for progress reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub username: String,
    pub status: Status,
    pub collected: usize,
    pub responses_captured: u32,
    pub scroll_count: u32,
    pub request_count: u64,
    pub remaining: u32,
    pub limit: u32,
    pub delay_ms: u64,
    pub replies_skipped: usize,
    pub duplicates_skipped: usize,
}

impl Session {
    pub fn new(
        username: &str,
        settings: Settings,
        pacing: PacingPolicy,
        completion: CompletionPolicy,
        created_at: Millis,
    ) -> Self {
        let rate = RateLimitState::new(&pacing);
        Self {
            username: normalize_username(username).unwrap_or_default(),
            settings,
            pacing,
            completion,
            rate,
            lifecycle: LifecycleState::new(created_at),
            collected: Vec::new(),
            seen: HashSet::new(),
            responses_captured: 0,
            scroll_count: 0,
            replies_skipped: 0,
            duplicates_skipped: 0,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    pub fn completion(&self) -> &CompletionPolicy {
        &self.completion
    }

    pub fn rate(&self) -> &RateLimitState {
        &self.rate
    }

    pub fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }

    pub fn status(&self) -> Status {
        self.lifecycle.status
    }

    /// Items captured in this session, deduplicated, in capture order.
    pub fn collected(&self) -> &[TimelineItem] {
        &self.collected
    }

    pub fn responses_captured(&self) -> u32 {
        self.responses_captured
    }

    pub fn scroll_count(&self) -> u32 {
        self.scroll_count
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            username: self.username.clone(),
            status: self.lifecycle.status,
            collected: self.collected.len(),
            responses_captured: self.responses_captured,
            scroll_count: self.scroll_count,
            request_count: self.rate.request_count,
            remaining: self.rate.remaining,
            limit: self.rate.limit,
            delay_ms: self.rate.delay_ms(),
            replies_skipped: self.replies_skipped,
            duplicates_skipped: self.duplicates_skipped,
        }
    }

    pub(crate) fn rate_mut(&mut self) -> &mut RateLimitState {
        &mut self.rate
    }

    pub(crate) fn set_lifecycle(&mut self, lifecycle: LifecycleState) {
        self.lifecycle = lifecycle;
    }

    pub(crate) fn record_scroll(&mut self) {
        self.scroll_count = self.scroll_count.saturating_add(1);
    }

    pub(crate) fn record_capture(&mut self) {
        self.responses_captured = self.responses_captured.saturating_add(1);
    }

    pub(crate) fn record_reply_skipped(&mut self) {
        self.replies_skipped += 1;
    }

    /// Buffers an item unless its id was already collected. Returns whether it was new.
    pub(crate) fn push_item(&mut self, item: TimelineItem) -> bool {
        if !self.seen.insert(item.id().to_string()) {
            self.duplicates_skipped += 1;
            return false;
        }
        self.collected.push(item);
        true
    }

    /// True once the configured item cap (if any) has been reached.
    pub(crate) fn at_capacity(&self) -> bool {
        self.settings.max_count > 0 && self.collected.len() >= self.settings.max_count
    }
}
