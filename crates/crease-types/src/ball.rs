//! Ball model: one delivery's complete outcome.
//!
//! A [`BallEvent`] is the unit of the match ledger. Positional fields are
//! always assigned by the server from the ledger prefix; a client's
//! [`BallInput`] may carry a position, but it is advisory only.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PlayerId, SequenceNumber, constants};

/// How a batter was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissalKind {
    Bowled,
    Caught,
    RunOut,
    Stumped,
    Lbw,
    HitWicket,
    Retired,
    Other,
}

impl DismissalKind {
    /// Whether the bowler is credited with the wicket.
    #[must_use]
    pub fn credited_to_bowler(self) -> bool {
        matches!(
            self,
            Self::Bowled | Self::Caught | Self::Stumped | Self::Lbw | Self::HitWicket
        )
    }

    /// Whether this dismissal can happen off a wide.
    #[must_use]
    pub fn allowed_on_wide(self) -> bool {
        matches!(
            self,
            Self::Stumped | Self::RunOut | Self::HitWicket | Self::Retired | Self::Other
        )
    }

    /// Whether this dismissal can happen off a no-ball.
    #[must_use]
    pub fn allowed_on_no_ball(self) -> bool {
        matches!(self, Self::RunOut | Self::Retired | Self::Other)
    }

    /// Whether the non-striker can be the dismissed batter.
    #[must_use]
    pub fn may_dismiss_non_striker(self) -> bool {
        matches!(self, Self::RunOut | Self::Retired | Self::Other)
    }
}

impl fmt::Display for DismissalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bowled => "bowled",
            Self::Caught => "caught",
            Self::RunOut => "run out",
            Self::Stumped => "stumped",
            Self::Lbw => "lbw",
            Self::HitWicket => "hit wicket",
            Self::Retired => "retired",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// The kind of extra conceded on a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraKind {
    Wide,
    NoBall,
    Bye,
    LegBye,
}

impl ExtraKind {
    /// Whether a delivery carrying this extra still counts as a legal ball.
    ///
    /// Byes and leg-byes ride on a legal delivery; wides and no-balls do not.
    #[must_use]
    pub fn is_legal_delivery(self) -> bool {
        matches!(self, Self::Bye | Self::LegBye)
    }

    /// Whether the extra runs are charged to the bowler's analysis.
    #[must_use]
    pub fn charged_to_bowler(self) -> bool {
        matches!(self, Self::Wide | Self::NoBall)
    }

    /// Whether the extra carries a one-run penalty on top of runs taken.
    #[must_use]
    pub fn carries_penalty(self) -> bool {
        matches!(self, Self::Wide | Self::NoBall)
    }

    /// Short scorecard label (`wd`, `nb`, `b`, `lb`).
    #[must_use]
    pub fn short_label(self) -> &'static str {
        match self {
            Self::Wide => "wd",
            Self::NoBall => "nb",
            Self::Bye => "b",
            Self::LegBye => "lb",
        }
    }
}

impl fmt::Display for ExtraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Wide => "WIDE",
            Self::NoBall => "NO_BALL",
            Self::Bye => "BYE",
            Self::LegBye => "LEG_BYE",
        };
        f.write_str(label)
    }
}

/// Extras conceded on one delivery. `runs` includes any penalty run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extra {
    pub kind: ExtraKind,
    pub runs: u8,
}

/// A dismissal on one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wicket {
    pub kind: DismissalKind,
    pub batter: PlayerId,
}

/// Where a delivery sits: innings (1 or 2), over (0-based), ball (1..=6).
///
/// A wide or no-ball carries the slot the next legal delivery will take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BallPosition {
    pub innings: u8,
    pub over: u32,
    pub ball_in_over: u8,
}

impl BallPosition {
    /// First ball of the given innings.
    #[must_use]
    pub fn opening(innings: u8) -> Self {
        Self {
            innings,
            over: 0,
            ball_in_over: 1,
        }
    }
}

impl fmt::Display for BallPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.over, self.ball_in_over)
    }
}

/// Free text attached to a committed ball after the fact (e.g. commentary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    /// BCP-47 style language tag, e.g. `en` or `ur`.
    pub language: String,
    pub attached_at: DateTime<Utc>,
}

/// One committed delivery in a match ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallEvent {
    /// Ledger position, assigned at append time.
    pub sequence: SequenceNumber,
    /// Server-derived position within the innings.
    pub position: BallPosition,
    pub runs_off_bat: u8,
    pub wicket: Option<Wicket>,
    pub extra: Option<Extra>,
    pub striker: PlayerId,
    pub non_striker: PlayerId,
    pub bowler: PlayerId,
    /// Attached asynchronously; never part of validity.
    pub annotation: Option<Annotation>,
    pub recorded_at: DateTime<Utc>,
}

impl BallEvent {
    /// Whether this delivery counts towards the six balls of an over.
    #[must_use]
    pub fn is_legal(&self) -> bool {
        self.extra.is_none_or(|extra| extra.kind.is_legal_delivery())
    }

    #[must_use]
    pub fn is_wicket(&self) -> bool {
        self.wicket.is_some()
    }

    #[must_use]
    pub fn extra_runs(&self) -> u32 {
        self.extra.map_or(0, |extra| u32::from(extra.runs))
    }

    /// Total runs added to the batting side's score.
    #[must_use]
    pub fn total_runs(&self) -> u32 {
        u32::from(self.runs_off_bat) + self.extra_runs()
    }

    /// Runs charged to the bowler: bat runs plus wides and no-balls.
    #[must_use]
    pub fn runs_conceded(&self) -> u32 {
        let charged = self
            .extra
            .filter(|extra| extra.kind.charged_to_bowler())
            .map_or(0, |extra| u32::from(extra.runs));
        u32::from(self.runs_off_bat) + charged
    }

    /// Whether the striker is credited with facing this delivery.
    #[must_use]
    pub fn faced_by_striker(&self) -> bool {
        self.extra.is_none_or(|extra| extra.kind != ExtraKind::Wide)
    }

    /// Runs physically run between the wickets; odd values swap strike.
    #[must_use]
    pub fn runs_run(&self) -> u32 {
        let bat = u32::from(self.runs_off_bat);
        match self.extra {
            None => bat,
            Some(extra) if extra.kind.carries_penalty() => {
                bat + u32::from(extra.runs.saturating_sub(constants::DEFAULT_PENALTY_RUNS))
            }
            Some(extra) => u32::from(extra.runs),
        }
    }

    /// Whether the bowler is credited with this delivery's wicket.
    #[must_use]
    pub fn bowler_wicket(&self) -> bool {
        self.wicket.is_some_and(|w| w.kind.credited_to_bowler())
    }
}

impl fmt::Display for BallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sequence, self.position)?;
        if let Some(wicket) = self.wicket {
            write!(f, " W({})", wicket.kind)?;
        }
        match self.extra {
            Some(extra) => write!(f, " {}{}", extra.runs, extra.kind.short_label()),
            None => write!(f, " {}", self.runs_off_bat),
        }
    }
}

/// A ball as submitted by the scorer client.
///
/// Mirrors the command surface body
/// `{runs, isWicket, dismissalKind?, extraKind?, extraRuns?, strikerId, bowlerId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallInput {
    /// Runs off the bat.
    #[serde(default)]
    pub runs: u8,
    #[serde(default)]
    pub is_wicket: bool,
    #[serde(default)]
    pub dismissal_kind: Option<DismissalKind>,
    /// Defaults to the striker when omitted.
    #[serde(default)]
    pub dismissed_batter_id: Option<PlayerId>,
    #[serde(default)]
    pub extra_kind: Option<ExtraKind>,
    /// Defaults to one penalty run for wides and no-balls.
    #[serde(default)]
    pub extra_runs: Option<u8>,
    pub striker_id: PlayerId,
    /// Defaults to the derived non-striker when omitted.
    #[serde(default)]
    pub non_striker_id: Option<PlayerId>,
    pub bowler_id: PlayerId,
    /// Required for runs off the bat above six (overthrows).
    #[serde(default)]
    pub confirm_high_score: bool,
    /// Advisory only; the server always recomputes the position.
    #[serde(default)]
    pub position: Option<BallPosition>,
}

impl BallInput {
    #[must_use]
    pub fn new(striker: PlayerId, bowler: PlayerId, runs: u8) -> Self {
        Self {
            runs,
            is_wicket: false,
            dismissal_kind: None,
            dismissed_batter_id: None,
            extra_kind: None,
            extra_runs: None,
            striker_id: striker,
            non_striker_id: None,
            bowler_id: bowler,
            confirm_high_score: false,
            position: None,
        }
    }

    #[must_use]
    pub fn with_non_striker(mut self, non_striker: PlayerId) -> Self {
        self.non_striker_id = Some(non_striker);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, kind: ExtraKind, runs: Option<u8>) -> Self {
        self.extra_kind = Some(kind);
        self.extra_runs = runs;
        self
    }

    #[must_use]
    pub fn with_wicket(mut self, kind: DismissalKind, batter: Option<PlayerId>) -> Self {
        self.is_wicket = true;
        self.dismissal_kind = Some(kind);
        self.dismissed_batter_id = batter;
        self
    }

    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirm_high_score = true;
        self
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl BallEvent {
    /// A plain delivery with runs off the bat at an explicit position.
    pub fn dummy_runs(sequence: u64, position: BallPosition, runs: u8) -> Self {
        Self {
            sequence: SequenceNumber(sequence),
            position,
            runs_off_bat: runs,
            wicket: None,
            extra: None,
            striker: PlayerId::from_bytes([1; 16]),
            non_striker: PlayerId::from_bytes([2; 16]),
            bowler: PlayerId::from_bytes([11; 16]),
            annotation: None,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_extra(mut self, kind: ExtraKind, runs: u8) -> Self {
        self.extra = Some(Extra { kind, runs });
        self
    }

    #[must_use]
    pub fn with_wicket(mut self, kind: DismissalKind) -> Self {
        self.wicket = Some(Wicket {
            kind,
            batter: self.striker,
        });
        self
    }
}
