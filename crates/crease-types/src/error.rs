//! Error types for the Crease scoring engine.
//!
//! All errors use the `CR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Ball validation errors
//! - 2xx: Phase / state machine errors
//! - 3xx: Ledger errors
//! - 4xx: Session and authorization errors
//! - 5xx: Broadcast errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{CommandId, InningsEnd, MatchId, MatchPhase, ScorerId, SequenceNumber};

/// Central error enum for all Crease operations.
#[derive(Debug, Error)]
pub enum ScoringError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The submitted ball is malformed or contradicts the match state.
    #[error("CR_ERR_100: Validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// The tracker flagged the innings complete; the scorer must end it first.
    #[error("CR_ERR_101: Innings awaiting close ({reason}); issue end-innings")]
    InningsAwaitingClose { reason: InningsEnd },

    // =================================================================
    // Phase Errors (2xx)
    // =================================================================
    /// A command was issued outside the phases that accept it.
    #[error("CR_ERR_200: Invalid state for {command}: match is {phase}")]
    InvalidState {
        command: &'static str,
        phase: MatchPhase,
    },

    /// Undo was requested on an empty ledger.
    #[error("CR_ERR_201: Nothing to undo")]
    NothingToUndo,

    /// The match is completed or abandoned.
    #[error("CR_ERR_202: Match closed ({phase})")]
    MatchClosed { phase: MatchPhase },

    // =================================================================
    // Ledger Errors (3xx)
    // =================================================================
    /// The durability layer refused or failed the write.
    #[error("CR_ERR_300: Ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// Truncation was requested on an empty ledger.
    #[error("CR_ERR_301: Ledger empty for {0}")]
    LedgerEmpty(MatchId),

    /// The referenced sequence number is not in the committed ledger.
    #[error("CR_ERR_302: Sequence {sequence} out of range (ledger length {len})")]
    SequenceOutOfRange { sequence: SequenceNumber, len: u64 },

    // =================================================================
    // Session Errors (4xx)
    // =================================================================
    /// No live session exists for the match.
    #[error("CR_ERR_400: Session not found: {0}")]
    SessionNotFound(MatchId),

    /// The caller may not score this match.
    #[error("CR_ERR_401: Unauthorized: {scorer} may not score {match_id}")]
    Unauthorized { scorer: ScorerId, match_id: MatchId },

    /// A command id was replayed.
    #[error("CR_ERR_402: Duplicate command: {0}")]
    DuplicateCommand(CommandId),

    /// The session cannot be disposed yet.
    #[error("CR_ERR_403: Session busy: {reason}")]
    SessionBusy { reason: String },

    // =================================================================
    // Broadcast Errors (5xx)
    // =================================================================
    /// The match already has the maximum number of viewers.
    #[error("CR_ERR_500: Subscriber limit reached ({max_subscribers})")]
    SubscriberLimitReached { max_subscribers: usize },

    /// The annotation is malformed.
    #[error("CR_ERR_501: Invalid annotation: {reason}")]
    InvalidAnnotation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CR_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CR_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("CR_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("CR_ERR_903: I/O error: {0}")]
    Io(String),
}

impl ScoringError {
    /// HTTP status for the scorer command surface.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed { .. } | Self::InvalidAnnotation { .. } => 422,
            Self::InvalidState { .. }
            | Self::NothingToUndo
            | Self::MatchClosed { .. }
            | Self::InningsAwaitingClose { .. }
            | Self::DuplicateCommand(_)
            | Self::SessionBusy { .. } => 409,
            Self::Unauthorized { .. } => 403,
            Self::SessionNotFound(_) | Self::LedgerEmpty(_) | Self::SequenceOutOfRange { .. } => {
                404
            }
            Self::SubscriberLimitReached { .. } => 429,
            Self::LedgerUnavailable { .. } => 503,
            Self::Configuration(_) | Self::Serialization(_) => 400,
            Self::Internal(_) | Self::Io(_) => 500,
        }
    }

    /// Shorthand for a validation failure.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ScoringError>;

impl From<std::io::Error> for ScoringError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
