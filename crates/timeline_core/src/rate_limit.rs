//! Rate-limit tracking: turns per-response header signals into pacing delays and
//! cooldown triggers.
//!
//! The tracker is a set of free functions over a caller-owned [`RateLimitState`].
//! Only one writer (the collection session) may call them, in response order.

use std::collections::BTreeMap;

use collector_logging::{collector_debug, collector_info, collector_warn};
use serde::{Deserialize, Serialize};

const LIMIT_HEADERS: [&str; 2] = ["x-rate-limit-limit", "rate-limit-limit"];
const REMAINING_HEADERS: [&str; 2] = ["x-rate-limit-remaining", "rate-limit-remaining"];
const RESET_HEADERS: [&str; 2] = ["x-rate-limit-reset", "rate-limit-reset"];

/// Pacing and cooldown tuning values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingPolicy {
    /// Limit assumed when the header is missing or unparsable.
    pub default_limit: u32,
    /// Remaining count assumed when the header is missing or unparsable.
    pub default_remaining: u32,
    /// Reset epoch assumed when the header is missing or unparsable.
    pub default_reset_epoch_seconds: i64,
    /// Requests between proactive cooldowns.
    pub batch_size: u64,
    /// `remaining` at or below this value triggers a cooldown.
    pub low_remaining_threshold: u32,
    pub min_delay_ms: f64,
    pub max_delay_ms: f64,
    /// Remaining fraction under which the delay starts growing.
    pub slowdown_fraction: f64,
    pub batch_cooldown_ms: u64,
    pub max_cooldown_ms: u64,
    /// Added on top of the server reset time before resuming.
    pub reset_margin_ms: u64,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            default_limit: 150,
            default_remaining: 150,
            default_reset_epoch_seconds: 0,
            batch_size: 50,
            low_remaining_threshold: 2,
            min_delay_ms: 1_000.0,
            max_delay_ms: 15_000.0,
            slowdown_fraction: 0.5,
            batch_cooldown_ms: 60_000,
            max_cooldown_ms: 15 * 60_000,
            reset_margin_ms: 5_000,
            backoff_base_ms: 30_000,
            max_backoff_ms: 15 * 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateLimitMode {
    #[default]
    Normal,
    Cooldown,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooldownReason {
    Batch,
    LowRemaining,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitState {
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch_seconds: i64,
    pub request_count: u64,
    pub dynamic_delay_ms: f64,
    pub mode: RateLimitMode,
    pub retry_count: u32,
    /// `request_count` at the most recent cooldown.
    pub last_cooldown_request: u64,
}

impl RateLimitState {
    pub fn new(policy: &PacingPolicy) -> Self {
        let limit = policy.default_limit.max(1);
        Self {
            limit,
            remaining: policy.default_remaining.min(limit),
            reset_epoch_seconds: policy.default_reset_epoch_seconds,
            request_count: 0,
            dynamic_delay_ms: floor_delay(policy),
            mode: RateLimitMode::Normal,
            retry_count: 0,
            last_cooldown_request: 0,
        }
    }

    /// Current inter-request delay, rounded to whole milliseconds.
    pub fn delay_ms(&self) -> u64 {
        self.dynamic_delay_ms.round().max(0.0) as u64
    }
}

/// Raw rate-limit header values as received; parsing happens in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RateLimitInfo {
    pub limit: Option<String>,
    pub remaining: Option<String>,
    pub reset: Option<String>,
}

impl RateLimitInfo {
    /// Reads the rate-limit headers (case-insensitive). Returns `None` when the
    /// response carried none of them.
    pub fn from_headers(headers: &BTreeMap<String, String>) -> Option<Self> {
        let lookup = |names: &[&str]| {
            headers
                .iter()
                .find(|(key, _)| names.iter().any(|name| key.eq_ignore_ascii_case(name)))
                .map(|(_, value)| value.clone())
        };
        let info = Self {
            limit: lookup(&LIMIT_HEADERS),
            remaining: lookup(&REMAINING_HEADERS),
            reset: lookup(&RESET_HEADERS),
        };
        if info.limit.is_none() && info.remaining.is_none() && info.reset.is_none() {
            None
        } else {
            Some(info)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitOutcome {
    pub triggered_batch_cooldown: bool,
    pub triggered_low_remaining_cooldown: bool,
}

impl RateLimitOutcome {
    /// The cooldown to enter, if any. Low remaining capacity takes precedence.
    pub fn cooldown_reason(&self) -> Option<CooldownReason> {
        if self.triggered_low_remaining_cooldown {
            Some(CooldownReason::LowRemaining)
        } else if self.triggered_batch_cooldown {
            Some(CooldownReason::Batch)
        } else {
            None
        }
    }
}

/// Records one observed response and, when headers are present, refreshes capacity,
/// pacing delay and cooldown triggers.
pub fn apply_rate_limit_info(
    state: &mut RateLimitState,
    info: Option<&RateLimitInfo>,
    policy: &PacingPolicy,
) -> RateLimitOutcome {
    state.request_count = state.request_count.saturating_add(1);
    let Some(info) = info else {
        return RateLimitOutcome::default();
    };

    let limit = parse_header(info.limit.as_deref())
        .filter(|limit| *limit > 0)
        .map(|limit| limit.min(i64::from(u32::MAX)) as u32)
        .unwrap_or_else(|| policy.default_limit.max(1));
    let remaining = parse_header(info.remaining.as_deref())
        .map(|remaining| remaining.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(policy.default_remaining);
    let reset = parse_header(info.reset.as_deref()).unwrap_or(policy.default_reset_epoch_seconds);

    state.limit = limit;
    state.remaining = remaining.min(limit);
    state.reset_epoch_seconds = reset;
    state.dynamic_delay_ms = compute_delay(state.remaining, state.limit, policy);

    let since_cooldown = state.request_count.saturating_sub(state.last_cooldown_request);
    let outcome = RateLimitOutcome {
        triggered_batch_cooldown: policy.batch_size > 0 && since_cooldown >= policy.batch_size,
        triggered_low_remaining_cooldown: state.remaining <= policy.low_remaining_threshold,
    };

    if let Some(reason) = outcome.cooldown_reason() {
        state.last_cooldown_request = state.request_count;
        if state.mode != RateLimitMode::Paused {
            state.mode = RateLimitMode::Cooldown;
        }
        collector_info!(
            "cooldown triggered ({reason:?}) after {} requests, remaining {}/{}",
            state.request_count,
            state.remaining,
            state.limit
        );
    } else {
        collector_debug!(
            "rate limit {}/{} reset={} delay={:.0}ms",
            state.remaining,
            state.limit,
            state.reset_epoch_seconds,
            state.dynamic_delay_ms
        );
    }
    outcome
}

/// How long a cooldown should last before collection resumes.
pub fn cooldown_duration_ms(
    state: &RateLimitState,
    reason: CooldownReason,
    now_epoch_seconds: i64,
    policy: &PacingPolicy,
) -> u64 {
    let floor = policy.batch_cooldown_ms;
    match reason {
        CooldownReason::Batch => floor,
        CooldownReason::LowRemaining => {
            let until_reset = state.reset_epoch_seconds.saturating_sub(now_epoch_seconds);
            if until_reset <= 0 {
                return floor;
            }
            let wait = (until_reset as u64)
                .saturating_mul(1_000)
                .saturating_add(policy.reset_margin_ms);
            wait.clamp(floor, policy.max_cooldown_ms.max(floor))
        }
    }
}

/// Records an explicit rate-limit rejection (HTTP 429) and returns the backoff to
/// wait before retrying.
pub fn register_rate_limit_hit(state: &mut RateLimitState, policy: &PacingPolicy) -> u64 {
    state.mode = RateLimitMode::Paused;
    state.retry_count = state.retry_count.saturating_add(1);
    state.remaining = 0;
    let exponent = state.retry_count.saturating_sub(1).min(16);
    let backoff = policy
        .backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(policy.max_backoff_ms);
    collector_warn!(
        "rate limited by server (retry #{}), backing off {}ms",
        state.retry_count,
        backoff
    );
    backoff
}

/// Clears the retry streak after a successful response.
pub fn register_success(state: &mut RateLimitState) {
    state.retry_count = 0;
}

pub fn end_cooldown(state: &mut RateLimitState) {
    state.mode = RateLimitMode::Normal;
}

/// Explicit policy reset: counters start over, capacity returns to the defaults.
pub fn reset(state: &mut RateLimitState, policy: &PacingPolicy) {
    *state = RateLimitState::new(policy);
}

fn parse_header(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    value.is_finite().then(|| value.trunc() as i64)
}

fn floor_delay(policy: &PacingPolicy) -> f64 {
    if policy.min_delay_ms.is_finite() {
        policy.min_delay_ms.max(0.0)
    } else {
        0.0
    }
}

fn compute_delay(remaining: u32, limit: u32, policy: &PacingPolicy) -> f64 {
    let floor = floor_delay(policy);
    let ceiling = if policy.max_delay_ms.is_finite() {
        policy.max_delay_ms.max(floor)
    } else {
        floor
    };
    let fraction = f64::from(remaining) / f64::from(limit.max(1));
    let threshold = policy.slowdown_fraction;
    if !(threshold.is_finite() && threshold > 0.0) {
        return floor;
    }
    let pressure = ((threshold - fraction) / threshold).clamp(0.0, 1.0);
    floor + (ceiling - floor) * pressure * pressure
}
