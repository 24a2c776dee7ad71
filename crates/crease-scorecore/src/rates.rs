//! Conventional cricket rate formulas, all reported to two decimal places.

use crease_types::{Rate, constants};
use rust_decimal::Decimal;

fn balls_per_over() -> Decimal {
    Decimal::from(constants::BALLS_PER_OVER)
}

/// Runs per over: `runs / (legal_balls / 6)`; `0.00` before the first legal ball.
#[must_use]
pub fn run_rate(runs: u32, legal_balls: u32) -> Rate {
    if legal_balls == 0 {
        return Rate::zero();
    }
    Rate::from_decimal(Decimal::from(runs) * balls_per_over() / Decimal::from(legal_balls))
}

/// Rate the chasing side needs: `(target - runs) / overs_remaining`.
///
/// `N/A` once no balls remain.
#[must_use]
pub fn required_run_rate(target: u32, runs: u32, balls_remaining: u32) -> Rate {
    if balls_remaining == 0 {
        return Rate::NotApplicable;
    }
    let needed = Decimal::from(target) - Decimal::from(runs);
    Rate::from_decimal(needed * balls_per_over() / Decimal::from(balls_remaining))
}

/// Runs per hundred balls faced.
#[must_use]
pub fn strike_rate(runs: u32, balls: u32) -> Rate {
    if balls == 0 {
        return Rate::zero();
    }
    Rate::from_decimal(Decimal::from(runs) * Decimal::ONE_HUNDRED / Decimal::from(balls))
}

/// Runs per dismissal; `N/A` for an unbeaten score, `0.00` for nothing at all.
#[must_use]
pub fn batting_average(runs: u32, dismissals: u32) -> Rate {
    if dismissals == 0 {
        return if runs > 0 {
            Rate::NotApplicable
        } else {
            Rate::zero()
        };
    }
    Rate::from_decimal(Decimal::from(runs) / Decimal::from(dismissals))
}

/// Runs conceded per over bowled.
#[must_use]
pub fn economy(runs_conceded: u32, legal_balls: u32) -> Rate {
    run_rate(runs_conceded, legal_balls)
}
