//! Derived scoreboard types.
//!
//! Everything here is a projection of the ledger. None of it is ever stored
//! as the source of truth: [`DerivedMatchState`] can always be rebuilt by
//! replaying the ledger from empty.

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{BallPosition, DismissalKind, InningsEnd, PlayerId, SequenceNumber, constants};

// ---------------------------------------------------------------------------
// Rate
// ---------------------------------------------------------------------------

/// A two-decimal cricket rate, or `N/A` when it cannot be defined.
///
/// Serialised as a string: `"7.20"` or `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    Value(Decimal),
    NotApplicable,
}

impl Rate {
    /// Round half away from zero to two places.
    #[must_use]
    pub fn from_decimal(value: Decimal) -> Self {
        Self::Value(value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::Value(Decimal::ZERO)
    }

    #[must_use]
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Value(value) => Some(*value),
            Self::NotApplicable => None,
        }
    }

    #[must_use]
    pub fn is_applicable(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value:.2}"),
            Self::NotApplicable => f.write_str("N/A"),
        }
    }
}

impl FromStr for Rate {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "N/A" {
            return Ok(Self::NotApplicable);
        }
        Decimal::from_str(s).map(Self::from_decimal)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Cricket overs notation for a count of legal balls: 27 balls → `"4.3"`.
#[must_use]
pub fn overs_notation(legal_balls: u32) -> String {
    let per_over = u32::from(constants::BALLS_PER_OVER);
    format!("{}.{}", legal_balls / per_over, legal_balls % per_over)
}

// ---------------------------------------------------------------------------
// Figures
// ---------------------------------------------------------------------------

/// Extras conceded in an innings, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrasBreakdown {
    pub wides: u32,
    pub no_balls: u32,
    pub byes: u32,
    pub leg_byes: u32,
}

impl ExtrasBreakdown {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.wides + self.no_balls + self.byes + self.leg_byes
    }
}

/// One batter's innings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattingFigures {
    pub player: PlayerId,
    pub runs: u32,
    pub balls_faced: u32,
    pub fours: u32,
    pub sixes: u32,
    pub strike_rate: Rate,
    pub average: Rate,
    pub dismissal: Option<DismissalKind>,
    /// Bowler credited with the dismissal, if any.
    pub dismissed_by: Option<PlayerId>,
}

/// One bowler's analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BowlingFigures {
    pub player: PlayerId,
    pub legal_balls: u32,
    pub overs: String,
    pub maidens: u32,
    pub runs_conceded: u32,
    pub wickets: u32,
    pub wides: u32,
    pub no_balls: u32,
    pub economy: Rate,
}

/// The stand between the current pair of batters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    /// 1 for the opening stand, 2 after the first wicket, and so on.
    pub for_wicket: u32,
    pub runs: u32,
    pub balls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallOfWicket {
    pub wicket_number: u32,
    pub batter: PlayerId,
    pub runs_at_fall: u32,
    pub overs: String,
    pub sequence: SequenceNumber,
}

/// Runs and wickets in one over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverSummary {
    pub innings: u8,
    pub over: u32,
    pub bowler: Option<PlayerId>,
    pub runs: u32,
    pub wickets: u32,
    pub extras: u32,
    pub legal_balls: u8,
    /// Scorecard labels in delivery order, e.g. `["4", "1", "W", "1wd"]`.
    pub deliveries: Vec<String>,
    pub complete: bool,
    pub maiden: bool,
}

// ---------------------------------------------------------------------------
// InningsScore / DerivedMatchState
// ---------------------------------------------------------------------------

/// Scoreboard for one innings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningsScore {
    pub innings: u8,
    pub runs: u32,
    pub wickets: u32,
    pub legal_balls: u32,
    pub overs: String,
    pub extras: ExtrasBreakdown,
    pub run_rate: Rate,
    /// Batter on strike for the next delivery, if known.
    pub striker: Option<PlayerId>,
    pub non_striker: Option<PlayerId>,
    /// Bowler of the most recent delivery.
    pub bowler: Option<PlayerId>,
    pub partnership: Partnership,
    pub batters: Vec<BattingFigures>,
    pub bowlers: Vec<BowlingFigures>,
    pub fall_of_wickets: Vec<FallOfWicket>,
    pub completed_overs: Vec<OverSummary>,
    pub current_over: Option<OverSummary>,
}

impl InningsScore {
    #[must_use]
    pub fn batter(&self, player: PlayerId) -> Option<&BattingFigures> {
        self.batters.iter().find(|b| b.player == player)
    }

    #[must_use]
    pub fn bowler_figures(&self, player: PlayerId) -> Option<&BowlingFigures> {
        self.bowlers.iter().find(|b| b.player == player)
    }
}

/// Snapshot of everything derivable from a ledger prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMatchState {
    /// Innings the scoreboard is presenting (1 or 2).
    pub current_innings: u8,
    /// Position the next delivery will take.
    pub next_ball: BallPosition,
    /// Sequence of the last event in the prefix.
    pub last_sequence: Option<SequenceNumber>,
    /// Number of events in the prefix.
    pub ball_count: u64,
    /// Innings seen so far; index 0 is the first innings.
    pub innings: Vec<InningsScore>,
    pub run_rate: Rate,
    /// First-innings runs + 1, once the first innings is closed.
    pub target: Option<u32>,
    pub runs_required: Option<u32>,
    pub balls_remaining: Option<u32>,
    pub required_run_rate: Option<Rate>,
    /// Candidate innings completion flagged by the tracker.
    pub innings_complete: Option<InningsEnd>,
    /// Whether the last event completed an over.
    pub over_complete: bool,
    /// Hex SHA-256 hash chain over the ledger prefix.
    pub ledger_digest: String,
}

impl DerivedMatchState {
    /// Scoreboard of the innings being presented.
    #[must_use]
    pub fn current(&self) -> Option<&InningsScore> {
        self.innings_score(self.current_innings)
    }

    #[must_use]
    pub fn innings_score(&self, innings: u8) -> Option<&InningsScore> {
        self.innings.iter().find(|i| i.innings == innings)
    }

    #[must_use]
    pub fn total_runs(&self) -> u32 {
        self.current().map_or(0, |i| i.runs)
    }

    #[must_use]
    pub fn wickets(&self) -> u32 {
        self.current().map_or(0, |i| i.wickets)
    }

    #[must_use]
    pub fn legal_balls(&self) -> u32 {
        self.current().map_or(0, |i| i.legal_balls)
    }
}
