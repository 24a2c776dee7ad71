//! # crease-scorecore
//!
//! **Pure deterministic score derivation for Crease.**
//!
//! Scorecore is the derivation plane: it folds an ordered ledger of ball
//! events into scoreboard state. It has:
//!
//! - **Zero side effects**: no storage, no locking, no broadcasting
//! - **Deterministic output**: same ledger prefix -> same state and digest
//! - **Legal-ball accounting**: wides and no-balls never advance the over
//! - **Replay equivalence**: incremental folding equals a full replay

pub mod aggregator;
pub mod context;
pub mod digest;
pub mod rates;
pub mod tracker;

pub use aggregator::{Aggregator, aggregate, delivery_label};
pub use context::DerivationContext;
pub use digest::{LedgerDigest, compute_ledger_digest, verify_ledger_digest};
pub use tracker::{OverTracker, TrackerState, track};
