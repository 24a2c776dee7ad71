//! Phase-aware command gate.
//!
//! Decides which scorer commands the current [`MatchPhase`] admits. Once a
//! match is terminal every command fails with [`ScoringError::MatchClosed`];
//! a command that is merely early or late fails with
//! [`ScoringError::InvalidState`].

use crease_types::{MatchPhase, Result, ScoringCommand, ScoringError};

/// Phase holder that guards every command before the state machine runs it.
#[derive(Debug, Clone, Copy)]
pub struct PhaseGate {
    current_phase: MatchPhase,
}

impl PhaseGate {
    /// Create a gate in the NOT_STARTED phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_phase: MatchPhase::NotStarted,
        }
    }

    pub fn set_phase(&mut self, phase: MatchPhase) {
        self.current_phase = phase;
    }

    #[must_use]
    pub fn current_phase(&self) -> MatchPhase {
        self.current_phase
    }

    /// Whether `command` is admitted in the current phase.
    #[must_use]
    pub fn admits(&self, command: &ScoringCommand) -> bool {
        use MatchPhase::{
            Abandoned, Completed, Innings1InProgress, Innings2InProgress, InningsBreak, NotStarted,
        };
        let phase = self.current_phase;
        match command {
            ScoringCommand::StartInnings => matches!(phase, NotStarted | InningsBreak),
            ScoringCommand::RecordBall(_) | ScoringCommand::EndInnings => phase.is_in_progress(),
            // Undo may step back across the innings break; an empty ledger is
            // the state machine's NothingToUndo, not a phase error.
            ScoringCommand::UndoLast => !matches!(phase, Completed | Abandoned),
            ScoringCommand::EndMatch { .. } | ScoringCommand::Abandon { .. } => {
                matches!(phase, Innings1InProgress | InningsBreak | Innings2InProgress)
            }
        }
    }

    /// Guard a command. Returns `Ok(())` if admitted.
    pub fn check(&self, command: &ScoringCommand) -> Result<()> {
        if self.admits(command) {
            return Ok(());
        }
        if self.current_phase.is_terminal() {
            return Err(ScoringError::MatchClosed {
                phase: self.current_phase,
            });
        }
        Err(ScoringError::InvalidState {
            command: command.name(),
            phase: self.current_phase,
        })
    }
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crease_types::*;

    use super::*;

    fn ball() -> ScoringCommand {
        ScoringCommand::RecordBall(BallInput::new(PlayerId::new(), PlayerId::new(), 0))
    }

    fn end_match() -> ScoringCommand {
        ScoringCommand::EndMatch {
            winner: None,
            summary: String::new(),
        }
    }

    #[test]
    fn not_started_admits_only_start_and_undo() {
        let gate = PhaseGate::new();
        assert!(gate.check(&ScoringCommand::StartInnings).is_ok());
        assert!(gate.check(&ScoringCommand::UndoLast).is_ok());
        let err = gate.check(&ball()).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::InvalidState {
                command: "record_ball",
                phase: MatchPhase::NotStarted
            }
        ));
        assert!(gate.check(&end_match()).is_err());
    }

    #[test]
    fn in_progress_admits_scoring() {
        let mut gate = PhaseGate::new();
        gate.set_phase(MatchPhase::Innings1InProgress);
        assert!(gate.check(&ball()).is_ok());
        assert!(gate.check(&ScoringCommand::EndInnings).is_ok());
        assert!(gate.check(&end_match()).is_ok());
        assert!(gate.check(&ScoringCommand::StartInnings).is_err());
    }

    #[test]
    fn innings_break_blocks_balls() {
        let mut gate = PhaseGate::new();
        gate.set_phase(MatchPhase::InningsBreak);
        let err = gate.check(&ball()).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));
        assert!(gate.check(&ScoringCommand::StartInnings).is_ok());
        assert!(gate.check(&ScoringCommand::UndoLast).is_ok());
    }

    #[test]
    fn terminal_phases_close_everything() {
        for phase in [MatchPhase::Completed, MatchPhase::Abandoned] {
            let mut gate = PhaseGate::new();
            gate.set_phase(phase);
            for command in [
                ball(),
                ScoringCommand::UndoLast,
                ScoringCommand::StartInnings,
                ScoringCommand::EndInnings,
                end_match(),
            ] {
                let err = gate.check(&command).unwrap_err();
                assert!(matches!(err, ScoringError::MatchClosed { .. }));
            }
        }
    }
}
