//! Messages pushed to match viewers.
//!
//! Every message for a match carries a `revision` that is strictly
//! increasing and never reused within its `stream`, plus the ledger
//! `sequence_number` it reflects.
//! Wire shape: `{type, match_id, stream, sequence_number, revision, payload}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Annotation, BallEvent, DerivedMatchState, InningsSummary, MatchId, MatchPhase, MatchResult,
    OverSummary, SequenceNumber, StreamId,
};

/// Discriminant of a [`LiveMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveMessageKind {
    Ball,
    OverComplete,
    InningsComplete,
    MatchComplete,
    Snapshot,
    Commentary,
}

impl fmt::Display for LiveMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ball => "BALL",
            Self::OverComplete => "OVER_COMPLETE",
            Self::InningsComplete => "INNINGS_COMPLETE",
            Self::MatchComplete => "MATCH_COMPLETE",
            Self::Snapshot => "SNAPSHOT",
            Self::Commentary => "COMMENTARY",
        };
        f.write_str(label)
    }
}

/// Why a full snapshot was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotReason {
    /// First message of a new subscription.
    Subscribe,
    /// The last ball was retracted; viewers must resync.
    Retraction,
    /// The phase changed without a ball (innings start, restore).
    PhaseChange,
}

/// Full state of a match at one ledger position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    pub reason: SnapshotReason,
    pub state: DerivedMatchState,
    /// Most recent balls, oldest first.
    pub recent_balls: Vec<BallEvent>,
    pub result: Option<MatchResult>,
}

/// Body of a live message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LivePayload {
    Ball {
        event: BallEvent,
        phase: MatchPhase,
        state: DerivedMatchState,
    },
    OverComplete(OverSummary),
    InningsComplete(InningsSummary),
    MatchComplete(MatchResult),
    Snapshot(MatchSnapshot),
    Commentary {
        sequence: SequenceNumber,
        annotation: Annotation,
    },
}

impl LivePayload {
    #[must_use]
    pub fn kind(&self) -> LiveMessageKind {
        match self {
            Self::Ball { .. } => LiveMessageKind::Ball,
            Self::OverComplete(_) => LiveMessageKind::OverComplete,
            Self::InningsComplete(_) => LiveMessageKind::InningsComplete,
            Self::MatchComplete(_) => LiveMessageKind::MatchComplete,
            Self::Snapshot(_) => LiveMessageKind::Snapshot,
            Self::Commentary { .. } => LiveMessageKind::Commentary,
        }
    }
}

/// One ordered message on a match's viewer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    pub match_id: MatchId,
    /// Topic incarnation that assigned `revision`.
    pub stream: StreamId,
    /// Ledger position this message reflects; `None` for an empty ledger.
    pub sequence_number: Option<SequenceNumber>,
    /// Per-match publication counter, assigned by the hub.
    pub revision: u64,
    #[serde(flatten)]
    pub payload: LivePayload,
}

impl LiveMessage {
    #[must_use]
    pub fn kind(&self) -> LiveMessageKind {
        self.payload.kind()
    }

    #[must_use]
    pub fn resume_point(&self) -> ResumePoint {
        ResumePoint {
            stream: self.stream,
            sequence_number: self.sequence_number,
            revision: self.revision,
        }
    }
}

/// Where a reconnecting viewer left off: the last message it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub stream: StreamId,
    pub sequence_number: Option<SequenceNumber>,
    pub revision: u64,
}
