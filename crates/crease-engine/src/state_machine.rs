//! Scoring state machine: the single owner of match mutation.
//!
//! ```text
//! NOT_STARTED → INNINGS_1_IN_PROGRESS → INNINGS_BREAK → INNINGS_2_IN_PROGRESS → COMPLETED
//!                        └──────────────────┴────────────────────┴──────→ ABANDONED
//! ```
//!
//! Every ball is validated against the current derivation, appended to the
//! ledger and only then folded into derived state. A failed append leaves the
//! machine exactly as it was. Undo retracts the last ledger entry and rebuilds
//! the derivation from the shorter prefix, reverting any boundary the
//! retracted ball had caused.

use std::sync::Arc;

use chrono::Utc;
use crease_scorecore::{Aggregator, DerivationContext, compute_ledger_digest};
use crease_types::{
    BallEvent, BallInput, CommandReply, DerivedMatchState, InningsEnd, InningsSummary, LivePayload,
    MatchCheckpoint, MatchId, MatchOutcome, MatchPhase, MatchResult, MatchSetup, MatchSnapshot,
    Result, ScoringCommand, ScoringError, SequenceNumber, SnapshotReason, TeamId,
};
use tracing::{debug, info, warn};

use crate::{BallValidator, LedgerStore, PhaseGate};

/// Something the live plane should publish after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Message {
        sequence_number: Option<SequenceNumber>,
        payload: LivePayload,
    },
    /// A full snapshot is due; the live plane materialises it.
    Snapshot(SnapshotReason),
}

/// Outcome of an accepted command.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub reply: CommandReply,
    pub emissions: Vec<Emission>,
}

/// Boundary state a checkpoint captures.
#[derive(Debug, Clone, PartialEq)]
struct Lifecycle {
    phase: MatchPhase,
    ctx: DerivationContext,
    innings_summaries: Vec<InningsSummary>,
    pending_close: Option<InningsEnd>,
    result: Option<MatchResult>,
}

/// Per-match scoring state machine.
pub struct ScoringStateMachine {
    setup: MatchSetup,
    ledger: Arc<dyn LedgerStore>,
    gate: PhaseGate,
    ctx: DerivationContext,
    aggregator: Aggregator,
    /// Committed ledger mirror; replayed after a retraction.
    events: Vec<BallEvent>,
    innings_summaries: Vec<InningsSummary>,
    pending_close: Option<InningsEnd>,
    result: Option<MatchResult>,
}

impl ScoringStateMachine {
    #[must_use]
    pub fn new(setup: MatchSetup, ledger: Arc<dyn LedgerStore>) -> Self {
        let aggregator = Aggregator::new(&setup.rules);
        Self {
            setup,
            ledger,
            gate: PhaseGate::new(),
            ctx: DerivationContext::first_innings(),
            aggregator,
            events: Vec::new(),
            innings_summaries: Vec::new(),
            pending_close: None,
            result: None,
        }
    }

    /// Rebuild a machine from a persisted ledger.
    ///
    /// Boundaries come from the saved [`MatchCheckpoint`] when it still
    /// describes a prefix of the ledger. Without one the machine resumes in
    /// the in-progress phase of the last recorded innings and applies any
    /// natural completion that prefix implies.
    pub fn restore(setup: MatchSetup, ledger: Arc<dyn LedgerStore>) -> Result<Self> {
        let events = ledger.load(setup.match_id)?;
        let checkpoint = ledger.checkpoint(setup.match_id)?;
        let mut machine = Self::new(setup, ledger);
        machine.aggregator = Aggregator::from_events(&machine.setup.rules, &events);
        machine.events = events;

        match checkpoint.filter(|checkpoint| machine.checkpoint_applies(checkpoint)) {
            Some(checkpoint) => machine.resume_from(checkpoint),
            None => machine.derive_boundaries(),
        }

        info!(
            match_id = %machine.setup.match_id,
            balls = machine.events.len(),
            phase = %machine.phase(),
            "Match restored from ledger"
        );
        Ok(machine)
    }

    fn checkpoint_applies(&self, checkpoint: &MatchCheckpoint) -> bool {
        let Ok(len) = usize::try_from(checkpoint.ledger_len) else {
            return false;
        };
        if len > self.events.len() {
            return false;
        }
        // Only an open innings can have grown since the checkpoint.
        if len < self.events.len() && !checkpoint.phase.is_in_progress() {
            return false;
        }
        compute_ledger_digest(&self.events[..len]).to_hex() == checkpoint.ledger_digest
    }

    fn resume_from(&mut self, checkpoint: MatchCheckpoint) {
        let trailing = self.events.len() as u64 > checkpoint.ledger_len;
        self.gate.set_phase(checkpoint.phase);
        self.ctx = DerivationContext {
            current_innings: checkpoint.current_innings,
            first_innings_closed: !checkpoint.innings_summaries.is_empty(),
        };
        self.innings_summaries = checkpoint.innings_summaries;
        self.pending_close = checkpoint.pending_close;
        self.result = checkpoint.result;
        if trailing && self.pending_close.is_none() {
            self.settle_completion(&mut Vec::new());
        }
    }

    fn derive_boundaries(&mut self) {
        let Some(last_innings) = self.events.last().map(|e| e.position.innings) else {
            return;
        };
        if last_innings > 1 {
            let reason = self
                .aggregator
                .tracker()
                .completion(1, None)
                .unwrap_or(InningsEnd::Declared);
            let summary = self.innings_summary(1, reason);
            self.innings_summaries.push(summary);
            self.ctx = DerivationContext::second_innings();
        }
        self.gate.set_phase(MatchPhase::in_progress(last_innings));
        self.settle_completion(&mut Vec::new());
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.setup.match_id
    }

    #[must_use]
    pub fn setup(&self) -> &MatchSetup {
        &self.setup
    }

    #[must_use]
    pub fn phase(&self) -> MatchPhase {
        self.gate.current_phase()
    }

    #[must_use]
    pub fn state(&self) -> DerivedMatchState {
        self.aggregator.snapshot(self.ctx)
    }

    #[must_use]
    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    /// Natural innings end awaiting an explicit `end_innings`.
    #[must_use]
    pub fn pending_close(&self) -> Option<InningsEnd> {
        self.pending_close
    }

    #[must_use]
    pub fn innings_summaries(&self) -> &[InningsSummary] {
        &self.innings_summaries
    }

    #[must_use]
    pub fn ledger_len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        self.events.last().map(|e| e.sequence)
    }

    /// Full snapshot with the most recent `recent` balls read from the store,
    /// so attached annotations are included.
    pub fn snapshot(&self, reason: SnapshotReason, recent: usize) -> Result<MatchSnapshot> {
        let recent_balls = self.ledger.last_n(self.setup.match_id, recent)?;
        Ok(self.snapshot_with(reason, recent_balls))
    }

    /// Full snapshot around balls the caller already read.
    #[must_use]
    pub fn snapshot_with(
        &self,
        reason: SnapshotReason,
        recent_balls: Vec<BallEvent>,
    ) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.setup.match_id,
            phase: self.phase(),
            reason,
            state: self.state(),
            recent_balls,
            result: self.result.clone(),
        }
    }

    /// The most recent `n` committed balls from the in-memory mirror.
    #[must_use]
    pub fn recent_events(&self, n: usize) -> &[BallEvent] {
        &self.events[self.events.len().saturating_sub(n)..]
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run any scoring command.
    ///
    /// A command that moves a lifecycle boundary saves a fresh checkpoint.
    /// If that save fails, a command that only changed the phase is undone
    /// and rejected; a ball or undo has already reached the ledger, so it
    /// stands and a later restore re-derives its boundaries.
    pub fn execute(&mut self, command: ScoringCommand) -> Result<Transition> {
        let name = command.name();
        let wrote_ledger = matches!(
            command,
            ScoringCommand::RecordBall(_) | ScoringCommand::UndoLast
        );
        let before = self.lifecycle();
        let outcome = match command {
            ScoringCommand::StartInnings => self.begin_innings(),
            ScoringCommand::RecordBall(input) => self.append_ball(input),
            ScoringCommand::UndoLast => self.retract_last(),
            ScoringCommand::EndInnings => self.declare_innings(),
            ScoringCommand::EndMatch { winner, summary } => self.award_match(winner, summary),
            ScoringCommand::Abandon { reason } => self.abandon_match(reason),
        };
        let outcome = outcome.and_then(|transition| {
            if self.lifecycle() == before {
                return Ok(transition);
            }
            match self.save_checkpoint() {
                Ok(()) => Ok(transition),
                Err(err) if wrote_ledger => {
                    warn!(
                        match_id = %self.setup.match_id,
                        command = name,
                        error = %err,
                        "Checkpoint not saved; restore will re-derive boundaries"
                    );
                    Ok(transition)
                }
                Err(err) => {
                    self.rewind(before);
                    Err(err)
                }
            }
        });
        if let Err(err) = &outcome {
            warn!(
                match_id = %self.setup.match_id,
                command = name,
                phase = %self.phase(),
                error = %err,
                "Command rejected"
            );
        }
        outcome
    }

    /// `NOT_STARTED → INNINGS_1` or `INNINGS_BREAK → INNINGS_2`.
    pub fn start_innings(&mut self) -> Result<Transition> {
        self.execute(ScoringCommand::StartInnings)
    }

    /// Validate, append and fold one ball.
    pub fn record_ball(&mut self, input: BallInput) -> Result<Transition> {
        self.execute(ScoringCommand::RecordBall(input))
    }

    /// Retract the last ball and revert anything it implied.
    pub fn undo_last(&mut self) -> Result<Transition> {
        self.execute(ScoringCommand::UndoLast)
    }

    /// Close the current innings on the scorer's word.
    pub fn end_innings(&mut self) -> Result<Transition> {
        self.execute(ScoringCommand::EndInnings)
    }

    /// Terminal: record the scorer's result.
    pub fn end_match(&mut self, winner: Option<TeamId>, summary: String) -> Result<Transition> {
        self.execute(ScoringCommand::EndMatch { winner, summary })
    }

    /// Terminal: abandon from any started, non-terminal phase.
    pub fn abandon(&mut self, reason: String) -> Result<Transition> {
        self.execute(ScoringCommand::Abandon { reason })
    }

    fn begin_innings(&mut self) -> Result<Transition> {
        self.gate.check(&ScoringCommand::StartInnings)?;
        let (phase, ctx) = if self.phase() == MatchPhase::NotStarted {
            (MatchPhase::Innings1InProgress, DerivationContext::first_innings())
        } else {
            (MatchPhase::Innings2InProgress, DerivationContext::second_innings())
        };
        self.gate.set_phase(phase);
        self.ctx = ctx;
        info!(match_id = %self.setup.match_id, %phase, "Innings started");
        Ok(self.transition(
            None,
            None,
            vec![Emission::Snapshot(SnapshotReason::PhaseChange)],
        ))
    }

    fn append_ball(&mut self, input: BallInput) -> Result<Transition> {
        self.gate.check(&ScoringCommand::RecordBall(input.clone()))?;
        if let Some(reason) = self.pending_close {
            return Err(ScoringError::InningsAwaitingClose { reason });
        }
        let innings = self.ctx.current_innings;

        let draft =
            BallValidator::new(&self.setup.rules, &self.aggregator, innings).validate(&input)?;
        let position = self.aggregator.tracker().next_position(innings);
        if let Some(advisory) = input.position.filter(|p| *p != position) {
            debug!(
                match_id = %self.setup.match_id,
                %advisory,
                %position,
                "Advisory position overwritten"
            );
        }
        let mut event = draft.into_event(
            SequenceNumber::from_index(self.events.len()),
            position,
            Utc::now(),
        );

        // Nothing below this append may fail: derived state follows the ledger.
        let sequence = self.ledger.append(self.setup.match_id, event.clone())?;
        event.sequence = sequence;
        self.events.push(event.clone());
        self.aggregator.push(&event);

        let mut boundary = Vec::new();
        let state = self.aggregator.snapshot(self.ctx);
        if state.over_complete {
            if let Some(summary) = self
                .aggregator
                .over_summary(innings, event.position.over)
            {
                info!(
                    match_id = %self.setup.match_id,
                    innings,
                    over = summary.over,
                    runs = summary.runs,
                    wickets = summary.wickets,
                    "Over complete"
                );
                boundary.push(Emission::Message {
                    sequence_number: Some(sequence),
                    payload: LivePayload::OverComplete(summary),
                });
            }
        }
        self.settle_completion(&mut boundary);

        info!(
            match_id = %self.setup.match_id,
            %sequence,
            position = %event.position,
            runs = event.total_runs(),
            wicket = event.is_wicket(),
            "Ball recorded"
        );

        let mut emissions = vec![Emission::Message {
            sequence_number: Some(sequence),
            payload: LivePayload::Ball {
                event,
                phase: self.phase(),
                state: self.state(),
            },
        }];
        emissions.append(&mut boundary);
        Ok(self.transition(Some(sequence), None, emissions))
    }

    fn retract_last(&mut self) -> Result<Transition> {
        self.gate.check(&ScoringCommand::UndoLast)?;
        if self.events.is_empty() {
            return Err(ScoringError::NothingToUndo);
        }
        let retracted = match self.ledger.truncate_last(self.setup.match_id) {
            Ok(event) => event,
            Err(ScoringError::LedgerEmpty(_)) => return Err(ScoringError::NothingToUndo),
            Err(err) => return Err(err),
        };
        self.events.pop();
        self.aggregator = Aggregator::from_events(&self.setup.rules, &self.events);

        let innings = retracted.position.innings;
        self.gate.set_phase(MatchPhase::in_progress(innings));
        self.ctx = if innings > 1 {
            DerivationContext::second_innings()
        } else {
            DerivationContext::first_innings()
        };
        self.innings_summaries.truncate(usize::from(innings - 1));
        // A shorter prefix can still be complete (e.g. after a declaration);
        // leave that for the scorer to close explicitly.
        self.pending_close = self.state().innings_complete;

        info!(
            match_id = %self.setup.match_id,
            sequence = %retracted.sequence,
            phase = %self.phase(),
            "Ball retracted"
        );
        Ok(self.transition(
            None,
            Some(retracted),
            vec![Emission::Snapshot(SnapshotReason::Retraction)],
        ))
    }

    fn declare_innings(&mut self) -> Result<Transition> {
        self.gate.check(&ScoringCommand::EndInnings)?;
        let reason = self
            .pending_close
            .or(self.state().innings_complete)
            .unwrap_or(InningsEnd::Declared);
        let mut emissions = Vec::new();
        self.close_innings(reason, &mut emissions);
        Ok(self.transition(None, None, emissions))
    }

    fn award_match(&mut self, winner: Option<TeamId>, summary: String) -> Result<Transition> {
        self.gate.check(&ScoringCommand::EndMatch {
            winner,
            summary: String::new(),
        })?;
        let outcome = if winner.is_some() {
            MatchOutcome::Awarded
        } else {
            MatchOutcome::NoResult
        };
        let result = MatchResult {
            winner,
            outcome,
            summary,
        };
        Ok(self.finish(MatchPhase::Completed, result))
    }

    fn abandon_match(&mut self, reason: String) -> Result<Transition> {
        self.gate.check(&ScoringCommand::Abandon {
            reason: String::new(),
        })?;
        let result = MatchResult {
            winner: None,
            summary: format!("Match abandoned: {reason}"),
            outcome: MatchOutcome::Abandoned { reason },
        };
        Ok(self.finish(MatchPhase::Abandoned, result))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle {
            phase: self.phase(),
            ctx: self.ctx,
            innings_summaries: self.innings_summaries.clone(),
            pending_close: self.pending_close,
            result: self.result.clone(),
        }
    }

    fn rewind(&mut self, lifecycle: Lifecycle) {
        self.gate.set_phase(lifecycle.phase);
        self.ctx = lifecycle.ctx;
        self.innings_summaries = lifecycle.innings_summaries;
        self.pending_close = lifecycle.pending_close;
        self.result = lifecycle.result;
    }

    fn save_checkpoint(&self) -> Result<()> {
        let checkpoint = MatchCheckpoint {
            phase: self.phase(),
            current_innings: self.ctx.current_innings,
            innings_summaries: self.innings_summaries.clone(),
            pending_close: self.pending_close,
            result: self.result.clone(),
            ledger_len: self.events.len() as u64,
            ledger_digest: compute_ledger_digest(&self.events).to_hex(),
        };
        self.ledger.save_checkpoint(self.setup.match_id, checkpoint)
    }

    fn finish(&mut self, phase: MatchPhase, result: MatchResult) -> Transition {
        self.gate.set_phase(phase);
        self.pending_close = None;
        self.result = Some(result.clone());
        info!(
            match_id = %self.setup.match_id,
            %phase,
            summary = %result.summary,
            "Match closed"
        );
        let emissions = vec![Emission::Message {
            sequence_number: self.last_sequence(),
            payload: LivePayload::MatchComplete(result),
        }];
        self.transition(None, None, emissions)
    }

    /// Act on a natural innings end: close it, or hold it for the scorer.
    fn settle_completion(&mut self, emissions: &mut Vec<Emission>) {
        let Some(reason) = self.state().innings_complete else {
            return;
        };
        if self.setup.rules.auto_close_innings {
            self.close_innings(reason, emissions);
        } else {
            info!(
                match_id = %self.setup.match_id,
                %reason,
                "Innings awaiting close"
            );
            self.pending_close = Some(reason);
        }
    }

    fn close_innings(&mut self, reason: InningsEnd, emissions: &mut Vec<Emission>) {
        let innings = self.ctx.current_innings;
        let summary = self.innings_summary(innings, reason);
        self.innings_summaries.push(summary.clone());
        self.pending_close = None;
        info!(
            match_id = %self.setup.match_id,
            innings,
            %reason,
            runs = summary.runs,
            wickets = summary.wickets,
            "Innings complete"
        );
        emissions.push(Emission::Message {
            sequence_number: self.last_sequence(),
            payload: LivePayload::InningsComplete(summary),
        });

        if innings > 1 {
            let result = self.computed_result();
            self.gate.set_phase(MatchPhase::Completed);
            self.result = Some(result.clone());
            info!(
                match_id = %self.setup.match_id,
                summary = %result.summary,
                "Match complete"
            );
            emissions.push(Emission::Message {
                sequence_number: self.last_sequence(),
                payload: LivePayload::MatchComplete(result),
            });
        } else {
            self.gate.set_phase(MatchPhase::InningsBreak);
            self.ctx = DerivationContext::innings_break();
        }
    }

    fn innings_summary(&self, innings: u8, reason: InningsEnd) -> InningsSummary {
        let score = self.aggregator.innings_score(innings);
        InningsSummary {
            innings,
            batting_team: self.setup.batting_team(innings),
            runs: score.runs,
            wickets: score.wickets,
            legal_balls: score.legal_balls,
            overs: score.overs,
            extras: score.extras,
            reason,
            target: (innings == 1).then_some(score.runs + 1),
        }
    }

    /// Result of a completed chase.
    fn computed_result(&self) -> MatchResult {
        let tracker = self.aggregator.tracker();
        let first = tracker.runs(1);
        let second = tracker.runs(2);
        if second > first {
            let winner = self.setup.batting_team(2);
            let margin = self
                .setup
                .rules
                .all_out_wickets()
                .saturating_sub(tracker.wickets(2));
            MatchResult {
                winner: Some(winner),
                outcome: MatchOutcome::WonByWickets { margin },
                summary: format!("{winner} won by {margin} {}", plural(margin, "wicket")),
            }
        } else if second == first {
            MatchResult {
                winner: None,
                outcome: MatchOutcome::Tie,
                summary: "Match tied".to_string(),
            }
        } else {
            let winner = self.setup.batting_team(1);
            let margin = first - second;
            MatchResult {
                winner: Some(winner),
                outcome: MatchOutcome::WonByRuns { margin },
                summary: format!("{winner} won by {margin} {}", plural(margin, "run")),
            }
        }
    }

    fn transition(
        &self,
        sequence_number: Option<SequenceNumber>,
        retracted: Option<BallEvent>,
        emissions: Vec<Emission>,
    ) -> Transition {
        Transition {
            reply: CommandReply {
                match_id: self.setup.match_id,
                phase: self.phase(),
                sequence_number,
                state: self.state(),
                retracted,
                result: self.result.clone(),
            },
            emissions,
        }
    }
}

fn plural(count: u32, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
