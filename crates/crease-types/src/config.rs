//! Configuration types for matches and the live distribution plane.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{MatchId, Result, ScoringError, TeamId, constants};

/// Playing conditions for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRules {
    /// Overs allotted to each innings.
    pub overs_per_innings: u32,
    /// Players per side; the innings is all out at `players_per_side - 1` wickets.
    pub players_per_side: u8,
    /// Maximum overs any one bowler may bowl, if limited.
    pub max_overs_per_bowler: Option<u32>,
    /// Close an innings automatically when the tracker flags completion.
    /// When false the scorer must confirm with an explicit end-innings.
    pub auto_close_innings: bool,
}

impl MatchRules {
    /// Twenty overs a side, four overs per bowler.
    #[must_use]
    pub fn t20() -> Self {
        Self {
            overs_per_innings: constants::DEFAULT_OVERS_PER_INNINGS,
            players_per_side: constants::DEFAULT_PLAYERS_PER_SIDE,
            max_overs_per_bowler: Some(4),
            auto_close_innings: true,
        }
    }

    /// Fifty overs a side, ten overs per bowler.
    #[must_use]
    pub fn one_day() -> Self {
        Self {
            overs_per_innings: 50,
            players_per_side: constants::DEFAULT_PLAYERS_PER_SIDE,
            max_overs_per_bowler: Some(10),
            auto_close_innings: true,
        }
    }

    /// Wickets that end an innings.
    #[must_use]
    pub fn all_out_wickets(&self) -> u32 {
        u32::from(self.players_per_side.saturating_sub(1))
    }

    /// Legal deliveries allotted to an innings.
    #[must_use]
    pub fn balls_per_innings(&self) -> u32 {
        self.overs_per_innings * u32::from(constants::BALLS_PER_OVER)
    }

    pub fn validate(&self) -> Result<()> {
        if self.overs_per_innings == 0 {
            return Err(ScoringError::Configuration(
                "overs_per_innings must be > 0".to_string(),
            ));
        }
        if self.players_per_side < 2 {
            return Err(ScoringError::Configuration(
                "players_per_side must be >= 2".to_string(),
            ));
        }
        if self.max_overs_per_bowler == Some(0) {
            return Err(ScoringError::Configuration(
                "max_overs_per_bowler must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MatchRules {
    fn default() -> Self {
        Self::t20()
    }
}

/// Everything needed to open a live session for a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    pub match_id: MatchId,
    /// Team batting in the first innings.
    pub batting_first: TeamId,
    /// Team bowling in the first innings.
    pub fielding_first: TeamId,
    pub rules: MatchRules,
}

impl MatchSetup {
    #[must_use]
    pub fn new(match_id: MatchId, batting_first: TeamId, fielding_first: TeamId) -> Self {
        Self {
            match_id,
            batting_first,
            fielding_first,
            rules: MatchRules::default(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: MatchRules) -> Self {
        self.rules = rules;
        self
    }

    /// The team batting in the given innings.
    #[must_use]
    pub fn batting_team(&self, innings: u8) -> TeamId {
        if innings >= 2 {
            self.fielding_first
        } else {
            self.batting_first
        }
    }
}

/// Tuning for sessions and viewer fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Bounded queue capacity per viewer; overflow drops the viewer.
    pub subscriber_queue_capacity: usize,
    /// Maximum concurrent viewers per match.
    pub max_subscribers_per_match: usize,
    /// Live messages retained for resuming viewers.
    pub replay_tail_len: usize,
    /// Recent balls embedded in each snapshot.
    pub snapshot_recent_balls: usize,
    /// How long a closed match stays resident for late reconnects.
    pub retention: Duration,
    /// Interval between janitor sweeps.
    pub sweep_interval: Duration,
    /// Scorer command ids remembered per match for replay rejection.
    pub command_cache_size: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: constants::DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            max_subscribers_per_match: constants::DEFAULT_MAX_SUBSCRIBERS_PER_MATCH,
            replay_tail_len: constants::DEFAULT_REPLAY_TAIL_LEN,
            snapshot_recent_balls: constants::DEFAULT_SNAPSHOT_RECENT_BALLS,
            retention: Duration::from_secs(constants::DEFAULT_RETENTION_SECS),
            sweep_interval: Duration::from_secs(constants::DEFAULT_SWEEP_INTERVAL_SECS),
            command_cache_size: constants::DEFAULT_COMMAND_CACHE_SIZE,
        }
    }
}

impl LiveConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| ScoringError::Configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscriber_queue_capacity == 0 {
            return Err(ScoringError::Configuration(
                "subscriber_queue_capacity must be > 0".to_string(),
            ));
        }
        if self.max_subscribers_per_match == 0 {
            return Err(ScoringError::Configuration(
                "max_subscribers_per_match must be > 0".to_string(),
            ));
        }
        if self.command_cache_size == 0 {
            return Err(ScoringError::Configuration(
                "command_cache_size must be > 0".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ScoringError::Configuration(
                "sweep_interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
