//! Scorer command surface.
//!
//! ```text
//! POST /matches/{id}/balls        → ScoringCommand::RecordBall
//! POST /matches/{id}/undo         → ScoringCommand::UndoLast
//! POST /matches/{id}/end-innings  → ScoringCommand::EndInnings
//! POST /matches/{id}/end-match    → ScoringCommand::EndMatch
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    BallEvent, BallInput, CommandId, DerivedMatchState, MatchId, MatchPhase, MatchResult,
    ScorerId, SequenceNumber, TeamId,
};

/// A state-changing request from the authoritative scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ScoringCommand {
    StartInnings,
    RecordBall(BallInput),
    UndoLast,
    EndInnings,
    EndMatch {
        winner: Option<TeamId>,
        summary: String,
    },
    Abandon {
        reason: String,
    },
}

impl ScoringCommand {
    /// Short name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartInnings => "start_innings",
            Self::RecordBall(_) => "record_ball",
            Self::UndoLast => "undo_last",
            Self::EndInnings => "end_innings",
            Self::EndMatch { .. } => "end_match",
            Self::Abandon { .. } => "abandon",
        }
    }
}

/// A command addressed to a match on behalf of a scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Optional client id; a replayed id is rejected.
    pub command_id: Option<CommandId>,
    pub scorer: ScorerId,
    pub match_id: MatchId,
    #[serde(flatten)]
    pub command: ScoringCommand,
}

/// Synchronous answer to a scoring command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    /// Sequence assigned to a recorded ball.
    pub sequence_number: Option<SequenceNumber>,
    pub state: DerivedMatchState,
    /// Ball removed by an undo.
    pub retracted: Option<BallEvent>,
    pub result: Option<MatchResult>,
}
