use collector_logging::{collector_debug, collector_info, collector_warn};

use crate::rate_limit::{
    apply_rate_limit_info, cooldown_duration_ms, end_cooldown, register_rate_limit_hit,
    register_success,
};
use crate::{
    extract_timeline_items, is_reply, reduce, should_prompt_looks_done, Action, ActionKind,
    CooldownReason, Effect, Event, InterceptedResponse, Millis, PacingPolicy, PauseReason,
    Session, Status,
};

const TOO_MANY_REQUESTS: u16 = 429;
const UNAUTHORIZED: u16 = 401;
const FORBIDDEN: u16 = 403;

/// Pure update function: applies an event to the session and returns any effects.
pub fn update(mut session: Session, event: Event) -> (Session, Vec<Effect>) {
    if session.status().is_terminal() {
        collector_debug!("ignoring {} after session ended", event_name(&event));
        return (session, Vec::new());
    }

    let effects = match event {
        Event::Start { at } => {
            if session.status() != Status::Idle {
                return (session, Vec::new());
            }
            apply(&mut session, ActionKind::Start, at);
            collector_info!("collection started");
            vec![Effect::SetPacing {
                delay_ms: session.rate().delay_ms(),
            }]
        }
        Event::Response { response, at } => handle_response(&mut session, &response, at),
        Event::Scrolled { .. } => {
            if session.status() == Status::Running {
                session.record_scroll();
            }
            Vec::new()
        }
        Event::CooldownElapsed { at } => {
            if session.status() != Status::Cooldown {
                return (session, Vec::new());
            }
            end_cooldown(session.rate_mut());
            apply(&mut session, ActionKind::ExitCooldown, at);
            resumed_effects(&mut session, at)
        }
        Event::ManualResume { at } => {
            if session.status() != Status::PausedRateLimit {
                return (session, Vec::new());
            }
            end_cooldown(session.rate_mut());
            apply(&mut session, ActionKind::ResumeManual, at);
            resumed_effects(&mut session, at)
        }
        Event::IdleCheck { now, height_stable } => {
            let probe = session.completion().probe(
                now,
                session.scroll_count(),
                session.responses_captured(),
                height_stable,
            );
            if should_prompt_looks_done(session.lifecycle(), &probe) {
                vec![Effect::PromptLooksDone {
                    collected: session.collected().len(),
                }]
            } else {
                Vec::new()
            }
        }
        Event::ConfirmDone { at } => {
            // Stopping from a wait state resumes first so the pending-done transition applies.
            match session.status() {
                Status::Cooldown => {
                    end_cooldown(session.rate_mut());
                    apply(&mut session, ActionKind::ExitCooldown, at);
                }
                Status::PausedRateLimit => {
                    end_cooldown(session.rate_mut());
                    apply(&mut session, ActionKind::ResumeManual, at);
                }
                _ => {}
            }
            if apply(&mut session, ActionKind::MarkPendingDone, at) {
                vec![Effect::FinalizeExport]
            } else {
                Vec::new()
            }
        }
        Event::ExportWritten { at } => {
            if apply(&mut session, ActionKind::Complete, at) {
                collector_info!("export complete with {} new items", session.collected().len());
                vec![Effect::ClearResume]
            } else {
                Vec::new()
            }
        }
        Event::Cancel { at } => {
            apply(&mut session, ActionKind::Cancel, at);
            collector_info!("collection cancelled");
            if session.collected().is_empty() {
                Vec::new()
            } else {
                vec![Effect::PersistResume]
            }
        }
    };

    (session, effects)
}

fn handle_response(
    session: &mut Session,
    response: &InterceptedResponse,
    at: Millis,
) -> Vec<Effect> {
    if session.status() == Status::Idle || session.status() == Status::PendingDone {
        return Vec::new();
    }
    let running = session.status() == Status::Running;

    // Every observed response feeds the tracker, rejections included.
    let pacing = session.pacing().clone();
    let info = response.rate_limit_info();
    let cooldown_mark = session.rate().last_cooldown_request;
    let outcome = apply_rate_limit_info(session.rate_mut(), info.as_ref(), &pacing);
    if !running && outcome.cooldown_reason().is_some() {
        // No wait is entered from here, so the batch window stays open.
        session.rate_mut().last_cooldown_request = cooldown_mark;
    }

    match response.status {
        TOO_MANY_REQUESTS => {
            let backoff = register_rate_limit_hit(session.rate_mut(), &pacing);
            let wait_ms = retry_after_ms(session, backoff, at, &pacing);
            return pause(session, PauseReason::RateLimited, Some(wait_ms), at, running);
        }
        UNAUTHORIZED | FORBIDDEN => {
            collector_warn!(
                "response {} from {}: session looks logged out",
                response.status,
                response.url
            );
            return pause(session, PauseReason::AuthExpired, None, at, running);
        }
        _ => {}
    }

    let mut effects = Vec::new();
    if info.is_some() {
        effects.push(Effect::SetPacing {
            delay_ms: session.rate().delay_ms(),
        });
    }

    if response.is_success() {
        register_success(session.rate_mut());
        if let Some(body) = response.body.as_ref() {
            capture_items(session, body, at);
        }
    } else {
        collector_warn!("response {} from {}", response.status, response.url);
    }

    if finish_if_full(session, at) {
        effects.push(Effect::FinalizeExport);
        return effects;
    }

    if let Some(reason) = outcome.cooldown_reason() {
        if session.status() == Status::Running {
            let now_seconds = at.div_euclid(1_000);
            let duration_ms = cooldown_duration_ms(session.rate(), reason, now_seconds, &pacing);
            apply(session, ActionKind::EnterCooldown, at);
            effects.push(Effect::BeginCooldown {
                reason,
                duration_ms,
            });
            effects.push(Effect::PersistResume);
        }
    }
    effects
}

/// The larger of the backoff and the wait until a future reset announced by the server.
fn retry_after_ms(session: &Session, backoff: u64, at: Millis, pacing: &PacingPolicy) -> u64 {
    let now_seconds = at.div_euclid(1_000);
    if session.rate().reset_epoch_seconds <= now_seconds {
        return backoff;
    }
    let until_reset = cooldown_duration_ms(
        session.rate(),
        CooldownReason::LowRemaining,
        now_seconds,
        pacing,
    );
    backoff.max(until_reset)
}

fn capture_items(session: &mut Session, body: &serde_json::Value, at: Millis) {
    let items = extract_timeline_items(body);
    if items.is_empty() {
        return;
    }
    session.record_capture();

    let include_replies = session.settings().include_replies;
    let mut added = 0usize;
    for item in items {
        if session.at_capacity() {
            break;
        }
        if !include_replies && is_reply(&item) {
            session.record_reply_skipped();
            continue;
        }
        if session.push_item(item) {
            added += 1;
        }
    }
    collector_debug!("captured {} new items ({} total)", added, session.collected().len());
    if added > 0 {
        apply(session, ActionKind::Activity, at);
    }
}

/// Effects after returning to `Running`: new pacing, or finalization when the item
/// cap was reached while waiting.
fn resumed_effects(session: &mut Session, at: Millis) -> Vec<Effect> {
    if finish_if_full(session, at) {
        return vec![Effect::FinalizeExport];
    }
    vec![Effect::SetPacing {
        delay_ms: session.rate().delay_ms(),
    }]
}

fn finish_if_full(session: &mut Session, at: Millis) -> bool {
    if !session.at_capacity() || session.status() != Status::Running {
        return false;
    }
    collector_info!("reached max count of {}", session.settings().max_count);
    apply(session, ActionKind::MarkPendingDone, at)
}

fn pause(
    session: &mut Session,
    reason: PauseReason,
    retry_after_ms: Option<u64>,
    at: Millis,
    running: bool,
) -> Vec<Effect> {
    if !running {
        return Vec::new();
    }
    apply(session, ActionKind::PauseRateLimit, at);
    vec![
        Effect::PauseForRateLimit {
            reason,
            retry_after_ms,
        },
        Effect::PersistResume,
    ]
}

/// Runs one lifecycle action; returns whether the status changed.
fn apply(session: &mut Session, kind: ActionKind, at: Millis) -> bool {
    let before = *session.lifecycle();
    let after = reduce(before, Action::at(kind, at));
    session.set_lifecycle(after);
    after.status != before.status
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Start { .. } => "start",
        Event::Response { .. } => "response",
        Event::Scrolled { .. } => "scrolled",
        Event::CooldownElapsed { .. } => "cooldown_elapsed",
        Event::ManualResume { .. } => "manual_resume",
        Event::IdleCheck { .. } => "idle_check",
        Event::ConfirmDone { .. } => "confirm_done",
        Event::ExportWritten { .. } => "export_written",
        Event::Cancel { .. } => "cancel",
    }
}
