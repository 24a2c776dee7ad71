//! One live match: the single writer plus its viewer topic.
//!
//! Commands for a match are serialised through one async mutex, taken in
//! arrival order. While it is held the command executes, its ledger write
//! completes, and its live messages are published, so viewers observe
//! commands in exactly the order they were applied.
//!
//! Reads never take the writer lock: snapshots come from the topic and
//! annotations go straight to the ledger.

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use chrono::Utc;
use crease_engine::{Emission, LedgerStore, ScoringStateMachine, Transition};
use crease_types::{
    Annotation, CommandId, CommandReply, LiveConfig, MatchId, MatchPhase, MatchSetup,
    MatchSnapshot, ResumePoint, Result, ScoringCommand, ScoringError, SequenceNumber,
    SnapshotReason, constants,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::{
    CommandGuard,
    hub::{BroadcastHub, LiveSubscription, MatchTopic, Outbound},
};

/// State owned by the writer lock.
struct Writer {
    machine: ScoringStateMachine,
    commands: CommandGuard,
}

/// Lifecycle facts readable without the writer lock.
#[derive(Debug, Clone, Copy)]
struct Status {
    phase: MatchPhase,
    closed_at: Option<Instant>,
}

/// A resident match session.
pub struct MatchSession {
    match_id: MatchId,
    snapshot_recent_balls: usize,
    ledger: Arc<dyn LedgerStore>,
    topic: Arc<MatchTopic>,
    writer: AsyncMutex<Writer>,
    status: Mutex<Status>,
}

impl MatchSession {
    /// Open a session, restoring from the ledger if it already holds balls.
    pub fn open(
        setup: MatchSetup,
        ledger: Arc<dyn LedgerStore>,
        hub: &BroadcastHub,
        config: &LiveConfig,
    ) -> Result<Self> {
        setup.rules.validate()?;
        let match_id = setup.match_id;
        let machine = ScoringStateMachine::restore(setup, Arc::clone(&ledger))?;
        let initial = machine.snapshot(SnapshotReason::PhaseChange, config.snapshot_recent_balls)?;
        let topic = hub.open(initial)?;
        let phase = machine.phase();

        info!(
            match_id = %match_id,
            phase = %phase,
            balls = machine.ledger_len(),
            "Session opened"
        );

        Ok(Self {
            match_id,
            snapshot_recent_balls: config.snapshot_recent_balls,
            ledger,
            topic,
            writer: AsyncMutex::new(Writer {
                machine,
                commands: CommandGuard::new(config.command_cache_size),
            }),
            status: Mutex::new(Status {
                phase,
                closed_at: phase.is_terminal().then(Instant::now),
            }),
        })
    }

    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Phase as of the last applied command.
    #[must_use]
    pub fn phase(&self) -> MatchPhase {
        self.status().phase
    }

    /// When the match reached a terminal phase.
    #[must_use]
    pub fn closed_at(&self) -> Option<Instant> {
        self.status().closed_at
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.topic.subscriber_count()
    }

    /// Current full state, as a new viewer would see it.
    pub fn snapshot(&self) -> Result<MatchSnapshot> {
        let mut snapshot = self.topic.latest_snapshot()?;
        snapshot.reason = SnapshotReason::Subscribe;
        Ok(snapshot)
    }

    pub fn subscribe(&self, resume: Option<ResumePoint>) -> Result<LiveSubscription> {
        self.topic.subscribe(resume)
    }

    /// Apply one scorer command.
    ///
    /// Commands wait for the writer in arrival order. A command id seen
    /// before is rejected without touching the ledger. An id is remembered
    /// as soon as its command is applied, before anything is published, so a
    /// rejected command may be retried under the same id but an applied one
    /// is never applied twice.
    pub async fn execute(
        &self,
        command_id: Option<CommandId>,
        command: ScoringCommand,
    ) -> Result<CommandReply> {
        let mut writer = self.writer.lock().await;
        if let Some(id) = command_id {
            writer.commands.check(id)?;
        }

        let Transition { reply, emissions } = writer.machine.execute(command)?;
        if let Some(id) = command_id {
            writer.commands.record(id);
        }
        self.update_status(reply.phase);

        let latest = self.materialize_snapshot(&writer.machine, SnapshotReason::Subscribe);
        let batch = emissions
            .into_iter()
            .map(|emission| match emission {
                Emission::Message {
                    sequence_number,
                    payload,
                } => Outbound {
                    sequence_number,
                    payload,
                },
                Emission::Snapshot(reason) => {
                    let mut snapshot = latest.clone();
                    snapshot.reason = reason;
                    Outbound::snapshot(snapshot)
                }
            })
            .collect::<Vec<_>>();
        let published = batch.len();
        let revision = self.topic.publish(batch, latest)?;
        debug!(
            match_id = %self.match_id,
            phase = %reply.phase,
            published,
            revision,
            "Command applied"
        );
        Ok(reply)
    }

    /// Attach commentary to a committed ball and announce it.
    ///
    /// Goes to the ledger directly; scoring is never blocked by it. If the
    /// ball is retracted before the announcement goes out, the announcement
    /// is dropped and the call fails.
    pub fn annotate(&self, sequence: SequenceNumber, text: &str, language: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScoringError::InvalidAnnotation {
                reason: "text must not be empty".to_string(),
            });
        }
        if text.chars().count() > constants::MAX_ANNOTATION_CHARS {
            return Err(ScoringError::InvalidAnnotation {
                reason: format!(
                    "text exceeds {} characters",
                    constants::MAX_ANNOTATION_CHARS
                ),
            });
        }
        let language = language.trim();
        if language.is_empty() {
            return Err(ScoringError::InvalidAnnotation {
                reason: "language must not be empty".to_string(),
            });
        }

        let annotation = Annotation {
            text: text.to_string(),
            language: language.to_string(),
            attached_at: Utc::now(),
        };
        let event = self.ledger.annotate(self.match_id, sequence, annotation)?;
        self.topic.publish_commentary(&event)?;
        debug!(match_id = %self.match_id, sequence = %sequence, "Commentary attached");
        Ok(())
    }

    /// Snapshot of the machine's current state. A failed ledger read falls
    /// back to the machine's own mirror, which lacks annotations.
    fn materialize_snapshot(
        &self,
        machine: &ScoringStateMachine,
        reason: SnapshotReason,
    ) -> MatchSnapshot {
        match machine.snapshot(reason, self.snapshot_recent_balls) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    match_id = %self.match_id,
                    error = %err,
                    "Recent balls unreadable; snapshot built from memory"
                );
                let recent = machine.recent_events(self.snapshot_recent_balls).to_vec();
                machine.snapshot_with(reason, recent)
            }
        }
    }

    fn update_status(&self, phase: MatchPhase) {
        if let Ok(mut status) = self.status.lock() {
            status.phase = phase;
            if phase.is_terminal() {
                status.closed_at.get_or_insert_with(Instant::now);
            }
        }
    }

    fn status(&self) -> Status {
        self.status.lock().map_or(
            Status {
                phase: MatchPhase::NotStarted,
                closed_at: None,
            },
            |status| *status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crease_engine::InMemoryLedger;
    use crease_types::{BallInput, LiveMessageKind, LivePayload, PlayerId, TeamId};

    fn open_session(config: &LiveConfig) -> (MatchSession, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let hub = BroadcastHub::new(crate::HubLimits::from_config(config));
        let setup = MatchSetup::new(MatchId::new(), TeamId::new(), TeamId::new());
        let session = MatchSession::open(setup, ledger.clone(), &hub, config).unwrap();
        (session, ledger)
    }

    fn first_ball(striker: PlayerId, non_striker: PlayerId, bowler: PlayerId) -> ScoringCommand {
        ScoringCommand::RecordBall(BallInput::new(striker, bowler, 4).with_non_striker(non_striker))
    }

    #[tokio::test]
    async fn ball_is_published_after_ledger_write() {
        let (session, ledger) = open_session(&LiveConfig::default());
        let mut sub = session.subscribe(None).unwrap();
        session
            .execute(None, ScoringCommand::StartInnings)
            .await
            .unwrap();
        let reply = session
            .execute(
                None,
                first_ball(PlayerId::new(), PlayerId::new(), PlayerId::new()),
            )
            .await
            .unwrap();
        assert_eq!(reply.sequence_number, Some(SequenceNumber(0)));
        assert_eq!(ledger.len(session.match_id()).unwrap(), 1);

        let kinds: Vec<LiveMessageKind> = std::iter::from_fn(|| sub.try_recv().ok())
            .map(|m| m.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                LiveMessageKind::Snapshot,
                LiveMessageKind::Snapshot,
                LiveMessageKind::Ball
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_command_id_rejected_after_success() {
        let (session, ledger) = open_session(&LiveConfig::default());
        let id = CommandId::new();
        session
            .execute(Some(id), ScoringCommand::StartInnings)
            .await
            .unwrap();
        let err = session
            .execute(Some(id), ScoringCommand::UndoLast)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::DuplicateCommand(dup) if dup == id));
        assert_eq!(ledger.len(session.match_id()).unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_command_id_can_be_retried() {
        let (session, _) = open_session(&LiveConfig::default());
        let id = CommandId::new();
        let err = session
            .execute(Some(id), ScoringCommand::UndoLast)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::NothingToUndo));
        session
            .execute(Some(id), ScoringCommand::StartInnings)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn applied_command_id_survives_failed_publish() {
        let (session, ledger) = open_session(&LiveConfig::default());
        session
            .execute(None, ScoringCommand::StartInnings)
            .await
            .unwrap();
        session.topic.poison_lock();
        let (striker, non_striker, bowler) = (PlayerId::new(), PlayerId::new(), PlayerId::new());

        let id = CommandId::new();
        let err = session
            .execute(Some(id), first_ball(striker, non_striker, bowler))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Internal(_)));
        assert_eq!(ledger.len(session.match_id()).unwrap(), 1);

        let err = session
            .execute(Some(id), first_ball(striker, non_striker, bowler))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::DuplicateCommand(dup) if dup == id));
        assert_eq!(ledger.len(session.match_id()).unwrap(), 1);
    }

    #[tokio::test]
    async fn terminal_command_stamps_closed_at() {
        let (session, _) = open_session(&LiveConfig::default());
        assert!(session.closed_at().is_none());
        session
            .execute(None, ScoringCommand::StartInnings)
            .await
            .unwrap();
        session
            .execute(
                None,
                ScoringCommand::Abandon {
                    reason: "rain".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(session.phase(), MatchPhase::Abandoned);
        assert!(session.closed_at().is_some());
    }

    #[tokio::test]
    async fn annotation_is_validated_and_broadcast() {
        let (session, ledger) = open_session(&LiveConfig::default());
        session
            .execute(None, ScoringCommand::StartInnings)
            .await
            .unwrap();
        session
            .execute(
                None,
                first_ball(PlayerId::new(), PlayerId::new(), PlayerId::new()),
            )
            .await
            .unwrap();
        let mut sub = session.subscribe(None).unwrap();
        let _snapshot = sub.try_recv().unwrap();

        assert!(matches!(
            session.annotate(SequenceNumber(0), "   ", "en").unwrap_err(),
            ScoringError::InvalidAnnotation { .. }
        ));
        assert!(matches!(
            session.annotate(SequenceNumber(5), "Four!", "en").unwrap_err(),
            ScoringError::SequenceOutOfRange { .. }
        ));

        session
            .annotate(SequenceNumber(0), "Four through point", "en")
            .unwrap();
        let message = sub.try_recv().unwrap();
        assert!(matches!(
            &message.payload,
            LivePayload::Commentary { sequence, annotation }
                if *sequence == SequenceNumber(0) && annotation.text == "Four through point"
        ));
        let stored = ledger.load(session.match_id()).unwrap();
        assert!(stored[0].annotation.is_some());
        let snapshot = session.snapshot().unwrap();
        assert!(snapshot.recent_balls[0].annotation.is_some());
    }
}
