use repolens_core::{
    OverallStatus, PhaseBoard, PhaseName, PhaseStatus, PhaseUpdate, ProgressEvent, StatusSnapshot,
    Terminal,
};

fn init_logging() {
    lens_logging::initialize_for_tests();
}

fn phase_event(phase: PhaseName, status: PhaseStatus, percent: Option<u8>) -> ProgressEvent {
    ProgressEvent::Phase {
        phase,
        update: PhaseUpdate {
            status,
            percent,
            ..PhaseUpdate::default()
        },
    }
}

#[test]
fn replay_is_deterministic() {
    init_logging();
    let events = vec![
        phase_event(PhaseName::Transfer, PhaseStatus::Running, Some(40)),
        phase_event(PhaseName::Transfer, PhaseStatus::Complete, None),
        phase_event(PhaseName::Embedding, PhaseStatus::Running, Some(10)),
        ProgressEvent::JobComplete,
    ];

    let mut first = PhaseBoard::new();
    let mut second = PhaseBoard::new();
    for event in &events {
        first.apply(event);
    }
    for event in &events {
        second.apply(event);
    }

    assert_eq!(first, second);
}

#[test]
fn percent_is_derived_from_counts_when_absent() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&ProgressEvent::Phase {
        phase: PhaseName::Embedding,
        update: PhaseUpdate {
            status: PhaseStatus::Running,
            processed: Some(5),
            total: Some(10),
            ..PhaseUpdate::default()
        },
    });

    assert_eq!(board.phase(PhaseName::Embedding).percent, Some(50));
}

#[test]
fn missing_counts_stay_indeterminate() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&phase_event(PhaseName::Transfer, PhaseStatus::Running, None));

    assert_eq!(board.phase(PhaseName::Transfer).percent, None);
    assert_eq!(board.overall_percent(), None);
}

#[test]
fn overall_percent_averages_known_phases_only() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&phase_event(
        PhaseName::Transfer,
        PhaseStatus::Complete,
        Some(100),
    ));
    board.apply(&phase_event(
        PhaseName::Embedding,
        PhaseStatus::Running,
        Some(50),
    ));
    // Indexing has reported nothing numeric yet.
    assert_eq!(board.overall_percent(), Some(75));
}

#[test]
fn complete_phase_never_regresses() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&phase_event(PhaseName::Transfer, PhaseStatus::Complete, None));
    board.apply(&phase_event(PhaseName::Transfer, PhaseStatus::Running, Some(10)));
    board.apply(&phase_event(PhaseName::Transfer, PhaseStatus::Error, None));

    assert_eq!(board.phase(PhaseName::Transfer).status, PhaseStatus::Complete);
    assert_eq!(board.phase(PhaseName::Transfer).percent, Some(100));
}

#[test]
fn job_complete_fast_forwards_and_is_idempotent() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&phase_event(PhaseName::Transfer, PhaseStatus::Complete, None));
    board.apply(&ProgressEvent::JobComplete);

    let once = board.clone();
    assert_eq!(once.terminal(), Some(Terminal::Complete));
    assert!(once.all_complete());
    assert_eq!(once.phase(PhaseName::Indexing).percent, Some(100));

    // Receiving the terminal again (push and poll both report it) must
    // produce the same final state.
    board.apply(&ProgressEvent::JobComplete);
    assert_eq!(board, once);
}

#[test]
fn job_error_spares_completed_phases() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&phase_event(PhaseName::Transfer, PhaseStatus::Complete, None));
    board.apply(&ProgressEvent::JobError {
        message: Some("disk full".to_string()),
    });

    assert_eq!(board.terminal(), Some(Terminal::Error));
    assert_eq!(board.phase(PhaseName::Transfer).status, PhaseStatus::Complete);
    assert_eq!(board.phase(PhaseName::Embedding).status, PhaseStatus::Error);
    assert_eq!(board.first_error(), Some("disk full"));
}

#[test]
fn terminal_error_is_not_overwritten_by_completion() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&ProgressEvent::JobError { message: None });
    board.apply(&ProgressEvent::JobComplete);

    assert_eq!(board.terminal(), Some(Terminal::Error));
}

#[test]
fn no_regression_after_terminal() {
    init_logging();
    let mut board = PhaseBoard::new();
    board.apply(&ProgressEvent::JobComplete);
    board.apply(&phase_event(PhaseName::Indexing, PhaseStatus::Running, Some(10)));

    assert_eq!(board.phase(PhaseName::Indexing).status, PhaseStatus::Complete);
}

#[test]
fn snapshot_and_push_commute() {
    init_logging();
    let mut snapshot = StatusSnapshot {
        repo_id: "r1".to_string(),
        overall: OverallStatus::Indexing,
        ..StatusSnapshot::default()
    };
    snapshot.phases.insert(
        PhaseName::Transfer,
        PhaseUpdate {
            status: PhaseStatus::Complete,
            ..PhaseUpdate::default()
        },
    );
    let push = phase_event(PhaseName::Embedding, PhaseStatus::Running, Some(30));

    let mut push_first = PhaseBoard::new();
    push_first.apply(&push);
    push_first.apply_snapshot(&snapshot);

    let mut poll_first = PhaseBoard::new();
    poll_first.apply_snapshot(&snapshot);
    poll_first.apply(&push);

    assert_eq!(push_first, poll_first);
}

#[test]
fn wire_phase_names_accept_the_upload_alias() {
    init_logging();
    assert_eq!(PhaseName::parse("transfer"), Some(PhaseName::Transfer));
    assert_eq!(PhaseName::parse("upload"), Some(PhaseName::Transfer));
    assert_eq!(PhaseName::parse("embedding"), Some(PhaseName::Embedding));
    assert_eq!(PhaseName::parse("indexing"), Some(PhaseName::Indexing));
    assert_eq!(PhaseName::parse("linting"), None);
}
