//! Where in the match the ledger is being read from.

use crease_types::MatchPhase;

/// Lifecycle facts a fold needs but cannot learn from the ledger alone.
///
/// The ledger never records innings boundaries explicitly: an empty second
/// innings looks the same as an innings break. The state machine supplies
/// this context with every fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationContext {
    /// Innings presented as "current" (1 or 2).
    pub current_innings: u8,
    /// Whether the first innings has been closed, fixing the target.
    pub first_innings_closed: bool,
}

impl DerivationContext {
    #[must_use]
    pub fn first_innings() -> Self {
        Self {
            current_innings: 1,
            first_innings_closed: false,
        }
    }

    #[must_use]
    pub fn innings_break() -> Self {
        Self {
            current_innings: 1,
            first_innings_closed: true,
        }
    }

    #[must_use]
    pub fn second_innings() -> Self {
        Self {
            current_innings: 2,
            first_innings_closed: true,
        }
    }

    /// Context for a non-terminal phase. Terminal phases depend on how the
    /// match got there, so the caller keeps its previous context instead.
    #[must_use]
    pub fn for_phase(phase: MatchPhase) -> Option<Self> {
        match phase {
            MatchPhase::NotStarted | MatchPhase::Innings1InProgress => Some(Self::first_innings()),
            MatchPhase::InningsBreak => Some(Self::innings_break()),
            MatchPhase::Innings2InProgress => Some(Self::second_innings()),
            MatchPhase::Completed | MatchPhase::Abandoned => None,
        }
    }
}

impl Default for DerivationContext {
    fn default() -> Self {
        Self::first_innings()
    }
}
