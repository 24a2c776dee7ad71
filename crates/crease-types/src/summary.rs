//! Boundary summaries: over, innings and match completion.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ExtrasBreakdown, MatchPhase, TeamId};

/// Why an innings ended (or is a candidate to end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InningsEnd {
    AllOut,
    OversExhausted,
    TargetReached,
    /// Closed by an explicit scorer command.
    Declared,
}

impl fmt::Display for InningsEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AllOut => "ALL_OUT",
            Self::OversExhausted => "OVERS_EXHAUSTED",
            Self::TargetReached => "TARGET_REACHED",
            Self::Declared => "DECLARED",
        };
        f.write_str(label)
    }
}

/// Closing figures of an innings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningsSummary {
    pub innings: u8,
    pub batting_team: TeamId,
    pub runs: u32,
    pub wickets: u32,
    pub legal_balls: u32,
    pub overs: String,
    pub extras: ExtrasBreakdown,
    pub reason: InningsEnd,
    /// Target set for the chasing side (first innings only).
    pub target: Option<u32>,
}

/// How a match was decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchOutcome {
    WonByRuns { margin: u32 },
    WonByWickets { margin: u32 },
    Tie,
    /// Winner named by the scorer without a computed margin.
    Awarded,
    NoResult,
    Abandoned { reason: String },
}

/// Final result of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Option<TeamId>,
    pub outcome: MatchOutcome,
    pub summary: String,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

/// Lifecycle facts the ball ledger cannot express, saved beside it.
///
/// A checkpoint describes the match as of a ledger prefix, identified by its
/// length and digest. Balls appended after it were recorded in `phase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCheckpoint {
    pub phase: MatchPhase,
    /// Innings presented as current (1 or 2).
    pub current_innings: u8,
    pub innings_summaries: Vec<InningsSummary>,
    /// Natural innings end still waiting for the scorer.
    pub pending_close: Option<InningsEnd>,
    pub result: Option<MatchResult>,
    pub ledger_len: u64,
    /// Hex ledger digest of the first `ledger_len` balls.
    pub ledger_digest: String,
}
