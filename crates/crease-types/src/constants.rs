//! System-wide constants for the Crease scoring engine.

/// Legal deliveries in one over.
pub const BALLS_PER_OVER: u8 = 6;

/// Highest runs off the bat accepted without explicit confirmation.
pub const MAX_UNCONFIRMED_RUNS_OFF_BAT: u8 = 6;

/// Hard ceiling on runs off the bat, even with confirmation (overthrows).
pub const MAX_CONFIRMED_RUNS_OFF_BAT: u8 = 8;

/// Hard ceiling on extra runs recorded against a single delivery.
pub const MAX_EXTRA_RUNS: u8 = 7;

/// Penalty runs awarded for a wide or a no-ball when none are supplied.
pub const DEFAULT_PENALTY_RUNS: u8 = 1;

/// Default overs per innings (T20).
pub const DEFAULT_OVERS_PER_INNINGS: u32 = 20;

/// Default players per side; an innings is all out at one fewer wicket.
pub const DEFAULT_PLAYERS_PER_SIDE: u8 = 11;

/// Number of innings in a limited-overs match.
pub const INNINGS_PER_MATCH: u8 = 2;

/// Default bounded queue capacity per viewer subscription.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// Default maximum concurrent viewers per match.
pub const DEFAULT_MAX_SUBSCRIBERS_PER_MATCH: usize = 10_000;

/// Default number of recent live messages retained for resuming viewers.
pub const DEFAULT_REPLAY_TAIL_LEN: usize = 128;

/// Default number of recent balls embedded in a snapshot.
pub const DEFAULT_SNAPSHOT_RECENT_BALLS: usize = 12;

/// Default retention window (seconds) before a closed match session is disposed.
pub const DEFAULT_RETENTION_SECS: u64 = 15 * 60;

/// Default interval (seconds) between session janitor sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Default number of scorer command ids remembered per match.
pub const DEFAULT_COMMAND_CACHE_SIZE: usize = 4_096;

/// Maximum annotation length in characters.
pub const MAX_ANNOTATION_CHARS: usize = 2_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Crease";
