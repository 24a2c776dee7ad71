//! Scoring authority: "may this scorer submit events for this match?"
//!
//! Authorization itself lives outside the engine. The session manager only
//! consults a [`ScoringAuthority`] before routing a command, so an
//! unauthorized command never reaches a state machine.

use std::{
    collections::{HashMap, HashSet},
    sync::RwLock,
};

use crease_types::{MatchId, ScorerId};

/// Capability check consumed from the surrounding platform.
pub trait ScoringAuthority: Send + Sync {
    fn can_score(&self, scorer: ScorerId, match_id: MatchId) -> bool;
}

/// Admits every scorer. For tooling and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ScoringAuthority for AllowAll {
    fn can_score(&self, _scorer: ScorerId, _match_id: MatchId) -> bool {
        true
    }
}

/// Explicit per-match scorer assignments.
#[derive(Debug, Default)]
pub struct ScorerRoster {
    assignments: RwLock<HashMap<MatchId, HashSet<ScorerId>>>,
}

impl ScorerRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, match_id: MatchId, scorer: ScorerId) {
        if let Ok(mut assignments) = self.assignments.write() {
            assignments.entry(match_id).or_default().insert(scorer);
        }
    }

    /// Remove an assignment; returns whether it existed.
    pub fn revoke(&self, match_id: MatchId, scorer: ScorerId) -> bool {
        self.assignments
            .write()
            .is_ok_and(|mut assignments| {
                assignments
                    .get_mut(&match_id)
                    .is_some_and(|scorers| scorers.remove(&scorer))
            })
    }
}

impl ScoringAuthority for ScorerRoster {
    fn can_score(&self, scorer: ScorerId, match_id: MatchId) -> bool {
        // A poisoned roster denies.
        self.assignments.read().is_ok_and(|assignments| {
            assignments
                .get(&match_id)
                .is_some_and(|scorers| scorers.contains(&scorer))
        })
    }
}
