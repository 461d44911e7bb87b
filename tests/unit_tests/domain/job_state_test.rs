use audioscribe::domain::JobState;

const ALL: [JobState; 5] = [
    JobState::Pending,
    JobState::Running,
    JobState::Done,
    JobState::Failed,
    JobState::Cancelled,
];

#[test]
fn given_terminal_state_when_checking_edges_then_nothing_leaves_it() {
    for from in ALL.iter().filter(|s| s.is_terminal()) {
        for to in ALL {
            assert!(
                !from.can_transition_to(to),
                "{} -> {} should be rejected",
                from,
                to
            );
        }
    }
}

#[test]
fn given_pending_when_checking_edges_then_done_is_unreachable_directly() {
    assert!(JobState::Pending.can_transition_to(JobState::Running));
    assert!(JobState::Pending.can_transition_to(JobState::Cancelled));
    assert!(!JobState::Pending.can_transition_to(JobState::Done));
}

#[test]
fn given_running_when_checking_edges_then_all_outcomes_are_reachable() {
    for to in [
        JobState::Done,
        JobState::Pending,
        JobState::Failed,
        JobState::Cancelled,
    ] {
        assert!(JobState::Running.can_transition_to(to));
    }
}

#[test]
fn given_state_names_when_parsing_then_round_trips_through_display() {
    for state in ALL {
        let parsed: JobState = state.to_string().parse().unwrap();
        assert_eq!(parsed, state);
    }
}

#[test]
fn given_unknown_name_when_parsing_then_returns_error() {
    assert!("queued".parse::<JobState>().is_err());
}
