//! Ball validator: the hard gate every delivery passes before the ledger.
//!
//! The validator turns a scorer's [`BallInput`] into a normalised
//! [`BallDraft`] or rejects it with [`ScoringError::ValidationFailed`].
//! It reads the current derivation but never mutates it; positional fields
//! are not its concern (the state machine overwrites them).
//!
//! - **Fail-closed**: any failed check rejects the whole ball
//! - **Defaults filled here**: wide/no-ball penalty, dismissed batter,
//!   non-striker from the derived crease

use chrono::{DateTime, Utc};
use crease_scorecore::Aggregator;
use crease_types::{
    BallEvent, BallInput, BallPosition, Extra, ExtraKind, MatchRules, PlayerId,
    Result, ScoringError, SequenceNumber, Wicket, constants,
};

/// A validated ball, not yet positioned or sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallDraft {
    pub runs_off_bat: u8,
    pub extra: Option<Extra>,
    pub wicket: Option<Wicket>,
    pub striker: PlayerId,
    pub non_striker: PlayerId,
    pub bowler: PlayerId,
}

impl BallDraft {
    #[must_use]
    pub fn into_event(
        self,
        sequence: SequenceNumber,
        position: BallPosition,
        recorded_at: DateTime<Utc>,
    ) -> BallEvent {
        BallEvent {
            sequence,
            position,
            runs_off_bat: self.runs_off_bat,
            wicket: self.wicket,
            extra: self.extra,
            striker: self.striker,
            non_striker: self.non_striker,
            bowler: self.bowler,
            annotation: None,
            recorded_at,
        }
    }
}

fn reject(reason: impl Into<String>) -> ScoringError {
    ScoringError::invalid(reason)
}

/// Validates balls against the rules and the current derived state.
pub struct BallValidator<'a> {
    rules: &'a MatchRules,
    derived: &'a Aggregator,
    innings: u8,
}

impl<'a> BallValidator<'a> {
    #[must_use]
    pub fn new(rules: &'a MatchRules, derived: &'a Aggregator, innings: u8) -> Self {
        Self {
            rules,
            derived,
            innings,
        }
    }

    /// Validate a ball against all checks.
    ///
    /// # Errors
    /// [`ScoringError::ValidationFailed`] naming the first failed check.
    pub fn validate(&self, input: &BallInput) -> Result<BallDraft> {
        // 1. Runs off the bat
        Self::check_runs(input)?;

        // 2. Extras
        let extra = Self::check_extra(input)?;

        // 3. Batters at the crease
        let striker = input.striker_id;
        let non_striker = self.resolve_non_striker(input)?;
        if striker == non_striker {
            return Err(reject("striker and non-striker must differ"));
        }
        for batter in [striker, non_striker] {
            if self.derived.is_dismissed(self.innings, batter) {
                return Err(reject(format!("batter {batter} is already out")));
            }
        }
        if input.bowler_id == striker || input.bowler_id == non_striker {
            return Err(reject("bowler cannot be one of the batters"));
        }

        // 4. Dismissal
        let wicket = Self::check_wicket(input, extra, striker, non_striker)?;

        // 5. Bowling restrictions
        self.check_bowler(input.bowler_id)?;

        Ok(BallDraft {
            runs_off_bat: input.runs,
            extra,
            wicket,
            striker,
            non_striker,
            bowler: input.bowler_id,
        })
    }

    fn check_runs(input: &BallInput) -> Result<()> {
        if input.runs > constants::MAX_CONFIRMED_RUNS_OFF_BAT {
            return Err(reject(format!(
                "runs off bat {} exceeds maximum {}",
                input.runs,
                constants::MAX_CONFIRMED_RUNS_OFF_BAT
            )));
        }
        if input.runs > constants::MAX_UNCONFIRMED_RUNS_OFF_BAT && !input.confirm_high_score {
            return Err(reject(format!(
                "runs off bat {} above {} need boundary confirmation",
                input.runs,
                constants::MAX_UNCONFIRMED_RUNS_OFF_BAT
            )));
        }
        Ok(())
    }

    fn check_extra(input: &BallInput) -> Result<Option<Extra>> {
        let Some(kind) = input.extra_kind else {
            if input.extra_runs.is_some() {
                return Err(reject("extra runs given without an extra kind"));
            }
            return Ok(None);
        };
        let runs = match kind {
            ExtraKind::Wide | ExtraKind::NoBall => {
                input.extra_runs.unwrap_or(constants::DEFAULT_PENALTY_RUNS)
            }
            ExtraKind::Bye | ExtraKind::LegBye => input
                .extra_runs
                .ok_or_else(|| reject(format!("{kind} needs at least one run")))?,
        };
        if runs == 0 {
            return Err(reject(format!("{kind} needs at least one run")));
        }
        if runs > constants::MAX_EXTRA_RUNS {
            return Err(reject(format!(
                "extra runs {runs} exceed maximum {}",
                constants::MAX_EXTRA_RUNS
            )));
        }
        if kind != ExtraKind::NoBall && input.runs > 0 {
            return Err(reject(format!("no runs off the bat on a {kind}")));
        }
        Ok(Some(Extra { kind, runs }))
    }

    /// Explicit non-striker, else the other derived batter at the crease.
    fn resolve_non_striker(&self, input: &BallInput) -> Result<PlayerId> {
        if let Some(non_striker) = input.non_striker_id {
            return Ok(non_striker);
        }
        let (a, b) = self.derived.crease(self.innings);
        let others: Vec<PlayerId> = [a, b]
            .into_iter()
            .flatten()
            .filter(|player| *player != input.striker_id)
            .collect();
        match others.as_slice() {
            [only] => Ok(*only),
            _ => Err(reject("non-striker must be named")),
        }
    }

    fn check_wicket(
        input: &BallInput,
        extra: Option<Extra>,
        striker: PlayerId,
        non_striker: PlayerId,
    ) -> Result<Option<Wicket>> {
        if !input.is_wicket {
            if input.dismissal_kind.is_some() || input.dismissed_batter_id.is_some() {
                return Err(reject("dismissal details given without a wicket"));
            }
            return Ok(None);
        }
        let kind = input
            .dismissal_kind
            .ok_or_else(|| reject("wicket needs a dismissal kind"))?;
        let batter = input.dismissed_batter_id.unwrap_or(striker);
        if batter != striker && batter != non_striker {
            return Err(reject("dismissed batter is not at the crease"));
        }
        if batter == non_striker && !kind.may_dismiss_non_striker() {
            return Err(reject(format!("non-striker cannot be out {kind}")));
        }
        match extra.map(|extra| extra.kind) {
            Some(ExtraKind::Wide) if !kind.allowed_on_wide() => {
                return Err(reject(format!("cannot be out {kind} off a wide")));
            }
            Some(ExtraKind::NoBall) if !kind.allowed_on_no_ball() => {
                return Err(reject(format!("cannot be out {kind} off a no-ball")));
            }
            _ => {}
        }
        Ok(Some(Wicket { kind, batter }))
    }

    /// Quota checks apply when a new over starts. A bowler taking over
    /// mid-over must still not be the one who finished the previous over.
    fn check_bowler(&self, bowler: PlayerId) -> Result<()> {
        if self.derived.previous_over_bowler(self.innings) == Some(bowler) {
            return Err(reject(format!(
                "bowler {bowler} cannot bowl consecutive overs"
            )));
        }
        if self.derived.open_over_bowler(self.innings).is_some() {
            return Ok(());
        }
        if let Some(max_overs) = self.rules.max_overs_per_bowler {
            let bowled = self.derived.bowler_legal_balls(self.innings, bowler)
                / u32::from(constants::BALLS_PER_OVER);
            if bowled >= max_overs {
                return Err(reject(format!(
                    "bowler {bowler} has bowled the maximum {max_overs} overs"
                )));
            }
        }
        Ok(())
    }
}
