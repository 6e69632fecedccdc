use timeline_core::{
    reduce, should_prompt_looks_done, Action, ActionKind, CompletionPolicy, LifecycleState,
    LooksDoneProbe, Status,
};

const ALL_ACTIONS: [ActionKind; 9] = [
    ActionKind::Start,
    ActionKind::Activity,
    ActionKind::EnterCooldown,
    ActionKind::ExitCooldown,
    ActionKind::PauseRateLimit,
    ActionKind::ResumeManual,
    ActionKind::MarkPendingDone,
    ActionKind::Complete,
    ActionKind::Cancel,
];

fn running_at(at: i64) -> LifecycleState {
    reduce(LifecycleState::new(0), Action::at(ActionKind::Start, at))
}

fn probe(now: i64) -> LooksDoneProbe {
    LooksDoneProbe {
        now,
        idle_threshold_ms: 10_000,
        scroll_floor: 3,
        scroll_count: 10,
        responses_captured: 4,
        height_stable: true,
    }
}

#[test]
fn start_moves_idle_to_running() {
    let state = running_at(1_000);
    assert_eq!(state.status, Status::Running);
    assert_eq!(state.last_activity_at, 1_000);
}

#[test]
fn only_start_and_cancel_leave_idle() {
    for kind in ALL_ACTIONS {
        let next = reduce(LifecycleState::new(5), Action::at(kind, 99));
        match kind {
            ActionKind::Start => assert_eq!(next.status, Status::Running),
            ActionKind::Cancel => assert_eq!(next.status, Status::Cancelled),
            _ => assert_eq!(next, LifecycleState::new(5), "{kind:?} changed Idle"),
        }
    }
}

#[test]
fn full_happy_path() {
    let mut state = running_at(0);
    for (kind, expected) in [
        (ActionKind::Activity, Status::Running),
        (ActionKind::EnterCooldown, Status::Cooldown),
        (ActionKind::ExitCooldown, Status::Running),
        (ActionKind::PauseRateLimit, Status::PausedRateLimit),
        (ActionKind::ResumeManual, Status::Running),
        (ActionKind::MarkPendingDone, Status::PendingDone),
        (ActionKind::Complete, Status::Completed),
    ] {
        state = reduce(state, Action::at(kind, 10));
        assert_eq!(state.status, expected, "after {kind:?}");
    }
}

#[test]
fn activity_updates_timestamp_only_while_running() {
    let state = reduce(running_at(0), Action::at(ActionKind::Activity, 500));
    assert_eq!(state.last_activity_at, 500);

    let cooling = reduce(state, Action::at(ActionKind::EnterCooldown, 600));
    assert_eq!(cooling.last_activity_at, 500);
    let still = reduce(cooling, Action::at(ActionKind::Activity, 700));
    assert_eq!(still, cooling);
}

#[test]
fn terminal_states_absorb_every_action() {
    let completed = [ActionKind::MarkPendingDone, ActionKind::Complete]
        .into_iter()
            .fold(running_at(0), |state, kind| reduce(state, Action::at(kind, 1)));
    let cancelled = reduce(running_at(0), Action::at(ActionKind::Cancel, 1));

    for terminal in [completed, cancelled] {
        assert!(terminal.status.is_terminal());
        for kind in ALL_ACTIONS {
            assert_eq!(reduce(terminal, Action::at(kind, 1_000)), terminal);
        }
    }
}

#[test]
fn cancel_is_reachable_from_every_non_terminal_state() {
    let states = [
        LifecycleState::new(0),
        running_at(0),
        reduce(running_at(0), Action::at(ActionKind::EnterCooldown, 1)),
        reduce(running_at(0), Action::at(ActionKind::PauseRateLimit, 1)),
        reduce(running_at(0), Action::at(ActionKind::MarkPendingDone, 1)),
    ];
    for state in states {
        let next = reduce(state, Action::at(ActionKind::Cancel, 2));
        assert_eq!(next.status, Status::Cancelled, "from {:?}", state.status);
    }
}

#[test]
fn complete_requires_pending_done() {
    let state = reduce(running_at(0), Action::at(ActionKind::Complete, 5));
    assert_eq!(state.status, Status::Running);
}

#[test]
fn resuming_resets_idle_clock() {
    let cooling = reduce(running_at(0), Action::at(ActionKind::EnterCooldown, 1_000));
    let resumed = reduce(cooling, Action::at(ActionKind::ExitCooldown, 900_000));
    assert_eq!(resumed.last_activity_at, 900_000);
    assert!(!should_prompt_looks_done(&resumed, &probe(900_001)));

    let paused = reduce(running_at(0), Action::at(ActionKind::PauseRateLimit, 1_000));
    let resumed = reduce(paused, Action::at(ActionKind::ResumeManual, 5_000_000));
    assert_eq!(resumed.last_activity_at, 5_000_000);
    assert!(!should_prompt_looks_done(&resumed, &probe(5_000_500)));
}

#[test]
fn missing_timestamp_uses_wall_clock() {
    let before = timeline_core::now_millis();
    let state = reduce(LifecycleState::new(0), Action::new(ActionKind::Start));
    assert!(state.last_activity_at >= before);
}

#[test]
fn looks_done_when_all_conditions_hold() {
    let state = running_at(0);
    assert!(should_prompt_looks_done(&state, &probe(10_000)));
    assert!(!should_prompt_looks_done(&state, &probe(9_999)));
}

#[test]
fn looks_done_requires_every_condition() {
    let state = running_at(0);
    let far = 1_000_000_000;

    let failing = [
        LooksDoneProbe {
            responses_captured: 0,
            ..probe(far)
        },
        LooksDoneProbe {
            scroll_count: 3,
            ..probe(far)
        },
        LooksDoneProbe {
            scroll_count: 0,
            ..probe(far)
        },
        LooksDoneProbe {
            height_stable: false,
            ..probe(far)
        },
    ];
    for probe in failing {
        assert!(!should_prompt_looks_done(&state, &probe), "{probe:?}");
    }
}

#[test]
fn looks_done_is_false_outside_running() {
    let far = 1_000_000_000;
    let states = [
        LifecycleState::new(0),
        reduce(running_at(0), Action::at(ActionKind::EnterCooldown, 0)),
        reduce(running_at(0), Action::at(ActionKind::PauseRateLimit, 0)),
        reduce(running_at(0), Action::at(ActionKind::MarkPendingDone, 0)),
        reduce(running_at(0), Action::at(ActionKind::Cancel, 0)),
    ];
    for state in states {
        assert!(!should_prompt_looks_done(&state, &probe(far)), "{:?}", state.status);
    }
}

#[test]
fn completion_policy_builds_probe() {
    let policy = CompletionPolicy {
        idle_threshold_ms: 7,
        scroll_floor: 2,
    };
    let probe = policy.probe(100, 3, 1, true);
    assert_eq!(probe.idle_threshold_ms, 7);
    assert_eq!(probe.scroll_floor, 2);
    assert!(should_prompt_looks_done(&running_at(90), &probe));
}
