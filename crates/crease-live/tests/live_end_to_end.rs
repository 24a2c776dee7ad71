//! Live plane end to end: scorer commands through the session manager,
//! viewers on the broadcast hub.

use std::{sync::Arc, time::Duration};

use crease_engine::{InMemoryLedger, LedgerStore};
use crease_live::{AllowAll, DropReason, LiveSubscription, SessionManager};
use crease_scorecore::{DerivationContext, aggregate};
use crease_types::*;

fn player(n: u8) -> PlayerId {
    PlayerId::from_bytes([n; 16])
}

struct Harness {
    manager: Arc<SessionManager>,
    ledger: Arc<InMemoryLedger>,
    scorer: ScorerId,
}

impl Harness {
    fn new(config: LiveConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let manager =
            SessionManager::new(config, ledger.clone(), Arc::new(AllowAll)).unwrap();
        Self {
            manager: Arc::new(manager),
            ledger,
            scorer: ScorerId::new(),
        }
    }

    fn with_ledger(ledger: Arc<InMemoryLedger>) -> Self {
        let manager =
            SessionManager::new(LiveConfig::default(), ledger.clone(), Arc::new(AllowAll))
                .unwrap();
        Self {
            manager: Arc::new(manager),
            ledger,
            scorer: ScorerId::new(),
        }
    }

    async fn open_match(&self) -> MatchId {
        let setup = MatchSetup::new(MatchId::new(), TeamId::new(), TeamId::new());
        let match_id = setup.match_id;
        self.manager.get_or_create(setup).unwrap();
        self.send(match_id, ScoringCommand::StartInnings)
            .await
            .unwrap();
        match_id
    }

    async fn send(&self, match_id: MatchId, command: ScoringCommand) -> Result<CommandReply> {
        self.manager
            .execute(CommandEnvelope {
                command_id: None,
                scorer: self.scorer,
                match_id,
                command,
            })
            .await
    }

    /// A legal ball by whoever the scoreboard has at the crease, with five
    /// bowlers rotating through the overs.
    async fn bowl(&self, match_id: MatchId, runs: u8) -> CommandReply {
        let input = next_ball(&self.manager.snapshot(match_id).unwrap().state, runs);
        self.send(match_id, ScoringCommand::RecordBall(input))
            .await
            .unwrap()
    }
}

fn next_ball(state: &DerivedMatchState, runs: u8) -> BallInput {
    let (striker, non_striker) = state
        .current()
        .and_then(|score| score.striker.zip(score.non_striker))
        .unwrap_or((player(1), player(2)));
    let rotation = u8::try_from(state.next_ball.over % 5).unwrap();
    BallInput::new(striker, player(11 + rotation), runs).with_non_striker(non_striker)
}

fn drain(sub: &mut LiveSubscription) -> Vec<LiveMessage> {
    std::iter::from_fn(|| sub.try_recv().ok()).collect()
}

fn assert_revisions_increase(messages: &[LiveMessage]) {
    for pair in messages.windows(2) {
        assert!(
            pair[1].revision > pair[0].revision,
            "revision {} followed {}",
            pair[1].revision,
            pair[0].revision
        );
    }
}

#[tokio::test]
async fn viewer_joining_mid_over_sees_snapshot_then_every_later_ball() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    for runs in [1, 0, 2, 4, 1, 0, 1, 1, 0, 3, 2] {
        h.bowl(match_id, runs).await;
    }

    let mut viewer = h.manager.subscribe(match_id, None).unwrap();
    for runs in [0, 1, 6, 0, 1] {
        h.bowl(match_id, runs).await;
    }

    let messages = drain(&mut viewer);
    let first = &messages[0];
    let LivePayload::Snapshot(snapshot) = &first.payload else {
        panic!("expected snapshot first, got {}", first.kind());
    };
    assert_eq!(snapshot.reason, SnapshotReason::Subscribe);
    assert_eq!(first.sequence_number, Some(SequenceNumber(10)));
    assert_eq!(snapshot.state.ball_count, 11);
    assert_eq!(snapshot.state.next_ball.to_string(), "1.6");

    let balls: Vec<u64> = messages
        .iter()
        .filter(|m| m.kind() == LiveMessageKind::Ball)
        .map(|m| m.sequence_number.unwrap().0)
        .collect();
    assert_eq!(balls, vec![11, 12, 13, 14, 15]);
    let overs = messages
        .iter()
        .filter(|m| m.kind() == LiveMessageKind::OverComplete)
        .count();
    assert_eq!(overs, 1);
    assert_revisions_increase(&messages);
}

#[tokio::test]
async fn slow_viewer_is_dropped_without_stalling_the_scorer() {
    let config = LiveConfig {
        subscriber_queue_capacity: 4,
        ..LiveConfig::default()
    };
    let h = Harness::new(config);
    let match_id = h.open_match().await;
    let slow = h.manager.subscribe(match_id, None).unwrap();
    let mut fast = h.manager.subscribe(match_id, None).unwrap();
    let mut received = drain(&mut fast);

    for _ in 0..10 {
        h.bowl(match_id, 1).await;
        received.extend(drain(&mut fast));
    }

    assert_eq!(slow.drop_reason(), Some(DropReason::Lagged));
    assert_eq!(fast.drop_reason(), None);
    assert_eq!(h.manager.hub().subscriber_count(match_id), 1);
    let balls = received
        .iter()
        .filter(|m| m.kind() == LiveMessageKind::Ball)
        .count();
    assert_eq!(balls, 10);
    assert_eq!(h.ledger.len(match_id).unwrap(), 10);
}

#[tokio::test]
async fn undo_broadcasts_retraction_and_sequence_is_reused() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    for runs in [1, 4, 6] {
        h.bowl(match_id, runs).await;
    }
    let mut viewer = h.manager.subscribe(match_id, None).unwrap();
    let _ = drain(&mut viewer);

    let reply = h.send(match_id, ScoringCommand::UndoLast).await.unwrap();
    assert_eq!(reply.retracted.unwrap().runs_off_bat, 6);
    h.bowl(match_id, 2).await;

    let messages = drain(&mut viewer);
    let LivePayload::Snapshot(retraction) = &messages[0].payload else {
        panic!("expected retraction snapshot");
    };
    assert_eq!(retraction.reason, SnapshotReason::Retraction);
    assert_eq!(messages[0].sequence_number, Some(SequenceNumber(1)));
    assert_eq!(retraction.state.total_runs(), 5);
    assert_eq!(messages[1].kind(), LiveMessageKind::Ball);
    assert_eq!(messages[1].sequence_number, Some(SequenceNumber(2)));
    assert_revisions_increase(&messages);
}

#[tokio::test]
async fn reconnecting_viewer_resumes_from_last_revision() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    let mut viewer = h.manager.subscribe(match_id, None).unwrap();
    for runs in [0, 1, 2] {
        h.bowl(match_id, runs).await;
    }
    let seen = drain(&mut viewer);
    let resume = seen.last().unwrap().resume_point();
    drop(viewer);

    h.bowl(match_id, 4).await;
    h.bowl(match_id, 0).await;

    let mut viewer = h.manager.subscribe(match_id, Some(resume)).unwrap();
    let missed = drain(&mut viewer);
    assert_eq!(missed.len(), 2);
    assert!(missed.iter().all(|m| m.kind() == LiveMessageKind::Ball));
    assert_eq!(missed[0].sequence_number, Some(SequenceNumber(3)));
    assert_eq!(missed[0].revision, resume.revision + 1);
}

#[tokio::test]
async fn closed_match_rejects_scoring_and_announces_result() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    h.bowl(match_id, 4).await;
    let mut viewer = h.manager.subscribe(match_id, None).unwrap();
    let _ = drain(&mut viewer);

    h.send(
        match_id,
        ScoringCommand::Abandon {
            reason: "waterlogged outfield".to_string(),
        },
    )
    .await
    .unwrap();
    let input = next_ball(&h.manager.snapshot(match_id).unwrap().state, 1);
    let err = h
        .send(match_id, ScoringCommand::RecordBall(input))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::MatchClosed { .. }));
    assert_eq!(h.ledger.len(match_id).unwrap(), 1);

    let messages = drain(&mut viewer);
    assert_eq!(messages.len(), 1);
    let LivePayload::MatchComplete(result) = &messages[0].payload else {
        panic!("expected match complete");
    };
    assert_eq!(result.summary, "Match abandoned: waterlogged outfield");
    let snapshot = h.manager.snapshot(match_id).unwrap();
    assert_eq!(snapshot.phase, MatchPhase::Abandoned);
    assert!(snapshot.result.is_some());
}

#[tokio::test]
async fn replayed_command_id_is_not_scored_twice() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    let command_id = CommandId::new();
    let input = next_ball(&h.manager.snapshot(match_id).unwrap().state, 4);
    let envelope = CommandEnvelope {
        command_id: Some(command_id),
        scorer: h.scorer,
        match_id,
        command: ScoringCommand::RecordBall(input),
    };

    h.manager.execute(envelope.clone()).await.unwrap();
    let err = h.manager.execute(envelope).await.unwrap_err();
    assert!(matches!(err, ScoringError::DuplicateCommand(id) if id == command_id));
    assert_eq!(h.ledger.len(match_id).unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commands_on_one_match_get_distinct_sequences() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    let mut viewer = h.manager.subscribe(match_id, None).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let manager = Arc::clone(&h.manager);
        let scorer = h.scorer;
        tasks.push(tokio::spawn(async move {
            let input = BallInput::new(player(1), player(11), 0)
                .with_non_striker(player(2))
                .with_extra(ExtraKind::Wide, None);
            manager
                .execute(CommandEnvelope {
                    command_id: None,
                    scorer,
                    match_id,
                    command: ScoringCommand::RecordBall(input),
                })
                .await
        }));
    }
    let mut sequences = Vec::new();
    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        sequences.push(reply.sequence_number.unwrap().0);
    }
    sequences.sort_unstable();
    assert_eq!(sequences, (0..20).collect::<Vec<_>>());

    let events = h.ledger.load(match_id).unwrap();
    let replayed = aggregate(
        &events,
        &MatchRules::t20(),
        DerivationContext::first_innings(),
    );
    let live = h.manager.snapshot(match_id).unwrap().state;
    assert_eq!(live, replayed);
    assert_eq!(live.total_runs(), 20);
    assert_eq!(live.legal_balls(), 0);

    let messages = drain(&mut viewer);
    let balls: Vec<u64> = messages
        .iter()
        .filter(|m| m.kind() == LiveMessageKind::Ball)
        .map(|m| m.sequence_number.unwrap().0)
        .collect();
    assert_eq!(balls, (0..20).collect::<Vec<_>>());
    assert_revisions_increase(&messages);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn matches_score_independently_in_parallel() {
    let h = Arc::new(Harness::new(LiveConfig::default()));
    let mut matches = Vec::new();
    for _ in 0..4 {
        matches.push(h.open_match().await);
    }

    let mut tasks = Vec::new();
    for (i, match_id) in matches.iter().copied().enumerate() {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            let runs = u8::try_from(i).unwrap();
            for _ in 0..12 {
                h.bowl(match_id, runs).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for (i, match_id) in matches.iter().enumerate() {
        let state = h.manager.snapshot(*match_id).unwrap().state;
        assert_eq!(state.ball_count, 12);
        assert_eq!(state.total_runs(), 12 * u32::try_from(i).unwrap());
        let events = h.ledger.load(*match_id).unwrap();
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence.0).collect();
        assert_eq!(sequences, (0..12).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn commentary_reaches_viewers_and_later_snapshots() {
    let h = Harness::new(LiveConfig::default());
    let match_id = h.open_match().await;
    h.bowl(match_id, 4).await;
    h.bowl(match_id, 0).await;
    let mut viewer = h.manager.subscribe(match_id, None).unwrap();
    let _ = drain(&mut viewer);

    h.manager
        .annotate(match_id, SequenceNumber(0), "Cracking drive through cover", "en")
        .unwrap();

    let messages = drain(&mut viewer);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind(), LiveMessageKind::Commentary);
    assert_eq!(messages[0].sequence_number, Some(SequenceNumber(0)));

    let mut late = h.manager.subscribe(match_id, None).unwrap();
    let first = late.try_recv().unwrap();
    let LivePayload::Snapshot(snapshot) = &first.payload else {
        panic!("expected snapshot");
    };
    let annotated = &snapshot.recent_balls[0];
    assert_eq!(
        annotated.annotation.as_ref().unwrap().text,
        "Cracking drive through cover"
    );
    // Annotations never change the score.
    assert_eq!(snapshot.state.total_runs(), 4);
}

#[tokio::test]
async fn session_restores_from_existing_ledger() {
    let ledger = Arc::new(InMemoryLedger::new());
    let first = Harness::with_ledger(ledger.clone());
    let match_id = first.open_match().await;
    for runs in [1, 2, 0, 4, 1, 1, 0, 6] {
        first.bowl(match_id, runs).await;
    }
    let before = first.manager.snapshot(match_id).unwrap().state;
    assert_eq!(
        first.manager.get(match_id).unwrap().phase(),
        MatchPhase::Innings1InProgress
    );

    let second = Harness::with_ledger(ledger);
    let setup = MatchSetup::new(match_id, TeamId::new(), TeamId::new());
    let session = second.manager.get_or_create(setup).unwrap();
    assert_eq!(session.phase(), MatchPhase::Innings1InProgress);
    let after = second.manager.snapshot(match_id).unwrap().state;
    assert_eq!(after, before);

    let reply = second.bowl(match_id, 2).await;
    assert_eq!(reply.sequence_number, Some(SequenceNumber(8)));
}

#[tokio::test]
async fn janitor_reclaims_closed_matches() {
    let config = LiveConfig {
        retention: Duration::ZERO,
        sweep_interval: Duration::from_millis(10),
        ..LiveConfig::default()
    };
    let h = Harness::new(config);
    let match_id = h.open_match().await;
    let still_open = h.open_match().await;
    let janitor = h.manager.spawn_janitor();

    h.send(
        match_id,
        ScoringCommand::EndMatch {
            winner: None,
            summary: "No result".to_string(),
        },
    )
    .await
    .unwrap();

    let mut attempts = 0;
    while h.manager.get(match_id).is_ok() && attempts < 100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        attempts += 1;
    }
    assert!(matches!(
        h.manager.get(match_id),
        Err(ScoringError::SessionNotFound(_))
    ));
    assert!(h.manager.get(still_open).is_ok());
    janitor.abort();
}

#[tokio::test]
async fn reopened_match_keeps_its_terminal_phase() {
    let config = LiveConfig {
        retention: Duration::ZERO,
        ..LiveConfig::default()
    };
    let h = Harness::new(config);
    let match_id = h.open_match().await;
    h.bowl(match_id, 4).await;
    h.send(
        match_id,
        ScoringCommand::EndMatch {
            winner: None,
            summary: "Bad light".to_string(),
        },
    )
    .await
    .unwrap();
    h.manager.dispose(match_id).unwrap();
    assert!(h.manager.get(match_id).is_err());

    let setup = MatchSetup::new(match_id, TeamId::new(), TeamId::new());
    let session = h.manager.get_or_create(setup).unwrap();
    assert_eq!(session.phase(), MatchPhase::Completed);
    assert!(session.closed_at().is_some());

    let err = h
        .send(match_id, ScoringCommand::UndoLast)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::MatchClosed { .. }));
    let input = next_ball(&h.manager.snapshot(match_id).unwrap().state, 1);
    let err = h
        .send(match_id, ScoringCommand::RecordBall(input))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::MatchClosed { .. }));
    assert_eq!(h.ledger.len(match_id).unwrap(), 1);

    let snapshot = h.manager.snapshot(match_id).unwrap();
    assert_eq!(snapshot.phase, MatchPhase::Completed);
    assert_eq!(snapshot.result.unwrap().summary, "Bad light");
}

#[tokio::test]
async fn resume_point_from_an_earlier_process_gets_a_snapshot() {
    let ledger = Arc::new(InMemoryLedger::new());
    let first = Harness::with_ledger(ledger.clone());
    let match_id = first.open_match().await;
    let mut viewer = first.manager.subscribe(match_id, None).unwrap();
    first.bowl(match_id, 4).await;
    first.bowl(match_id, 4).await;
    let resume = drain(&mut viewer).last().unwrap().resume_point();
    assert_eq!(resume.sequence_number, Some(SequenceNumber(1)));

    // A fresh process over the same ledger numbers its revisions from zero.
    let second = Harness::with_ledger(ledger);
    let setup = MatchSetup::new(match_id, TeamId::new(), TeamId::new());
    second.manager.get_or_create(setup).unwrap();
    for _ in 0..4 {
        second.bowl(match_id, 0).await;
    }

    let mut viewer = second.manager.subscribe(match_id, Some(resume)).unwrap();
    let messages = drain(&mut viewer);
    assert_eq!(messages.len(), 1);
    let LivePayload::Snapshot(snapshot) = &messages[0].payload else {
        panic!("expected snapshot, got {}", messages[0].kind());
    };
    assert_ne!(messages[0].stream, resume.stream);
    assert_eq!(messages[0].sequence_number, Some(SequenceNumber(5)));
    assert_eq!(snapshot.state.total_runs(), 8);
}
