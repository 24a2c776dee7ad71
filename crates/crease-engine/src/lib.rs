//! # crease-engine
//!
//! **Mutation plane**: the ledger store contract, ball validation, the phase
//! gate and the per-match scoring state machine.
//!
//! ## Architecture
//!
//! 1. **LedgerStore**: append-only per-match log; the source of truth
//! 2. **PhaseGate**: admits or rejects each command for the current phase
//! 3. **BallValidator**: hard gate that normalises a scorer's ball
//! 4. **ScoringStateMachine**: validates, appends, folds and emits
//!
//! ## Ball Flow
//!
//! ```text
//! BallInput → PhaseGate.check() → BallValidator.validate() → LedgerStore.append()
//!     → Aggregator.push() → Transition { reply, emissions } → live plane
//! ```
//!
//! Derived state is never mutated ahead of a confirmed append.

pub mod ledger;
pub mod phase_gate;
pub mod state_machine;
pub mod validation;

pub use ledger::{InMemoryLedger, LedgerStore};
pub use phase_gate::PhaseGate;
pub use state_machine::{Emission, ScoringStateMachine, Transition};
pub use validation::{BallDraft, BallValidator};
