//! Match lifecycle phases.
//!
//! ```text
//! NOT_STARTED → INNINGS_1_IN_PROGRESS → INNINGS_BREAK → INNINGS_2_IN_PROGRESS → COMPLETED
//!                         └──────────────────┴─────────────────┴──────────→ ABANDONED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a single match's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPhase {
    NotStarted,
    #[serde(rename = "INNINGS_1_IN_PROGRESS")]
    Innings1InProgress,
    InningsBreak,
    #[serde(rename = "INNINGS_2_IN_PROGRESS")]
    Innings2InProgress,
    Completed,
    Abandoned,
}

impl MatchPhase {
    /// The in-progress phase for an innings number (1 or 2).
    #[must_use]
    pub fn in_progress(innings: u8) -> Self {
        if innings >= 2 {
            Self::Innings2InProgress
        } else {
            Self::Innings1InProgress
        }
    }

    /// Whether balls may currently be recorded.
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Innings1InProgress | Self::Innings2InProgress)
    }

    /// Whether the match has reached an absorbing state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// The innings a ball recorded now would belong to.
    #[must_use]
    pub fn batting_innings(self) -> Option<u8> {
        match self {
            Self::Innings1InProgress => Some(1),
            Self::Innings2InProgress => Some(2),
            _ => None,
        }
    }

    /// The innings the scoreboard should currently present.
    #[must_use]
    pub fn display_innings(self) -> u8 {
        match self {
            Self::NotStarted | Self::Innings1InProgress | Self::InningsBreak => 1,
            Self::Innings2InProgress | Self::Completed | Self::Abandoned => 2,
        }
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Innings1InProgress => "INNINGS_1_IN_PROGRESS",
            Self::InningsBreak => "INNINGS_BREAK",
            Self::Innings2InProgress => "INNINGS_2_IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
        };
        f.write_str(label)
    }
}
