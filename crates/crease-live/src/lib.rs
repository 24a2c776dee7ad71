//! # crease-live
//!
//! **Distribution plane**: resident match sessions, single-writer command
//! routing, and fan-out of live messages to viewers.
//!
//! ## Architecture
//!
//! 1. **SessionManager**: match id → session registry; authorizes commands,
//!    reclaims closed matches
//! 2. **MatchSession**: one writer lock per match around the scoring state
//!    machine; publishes each command's messages before releasing it
//! 3. **BroadcastHub**: per-match topics with revisions, a resume tail and
//!    bounded per-viewer queues
//! 4. **CommandGuard**: rejects replayed scorer command ids
//! 5. **ScoringAuthority**: external "may this scorer score this match" check
//!
//! ## Command Flow
//!
//! ```text
//! CommandEnvelope → ScoringAuthority.can_score() → MatchSession (writer lock)
//!     → CommandGuard.check() → ScoringStateMachine.execute() → LedgerStore
//!     → MatchTopic.publish() → viewer queues
//! ```
//!
//! A slow viewer is dropped, never waited on.

pub mod authority;
pub mod hub;
pub mod idempotency;
pub mod manager;
pub mod session;

pub use authority::{AllowAll, ScorerRoster, ScoringAuthority};
pub use hub::{BroadcastHub, DropReason, HubLimits, LiveSubscription, MatchTopic, Outbound};
pub use idempotency::CommandGuard;
pub use manager::SessionManager;
pub use session::MatchSession;
