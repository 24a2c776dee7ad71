//! # crease-types
//!
//! Shared types, errors, and configuration for the **Crease** live scoring
//! engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`MatchId`], [`PlayerId`], [`TeamId`], [`ScorerId`], [`CommandId`], [`StreamId`], [`SequenceNumber`], [`SubscriberId`]
//! - **Ball model**: [`BallEvent`], [`BallInput`], [`BallPosition`], [`Extra`], [`Wicket`], [`Annotation`]
//! - **Lifecycle**: [`MatchPhase`]
//! - **Derived state**: [`DerivedMatchState`], [`InningsScore`], [`Rate`], figures and [`OverSummary`]
//! - **Boundaries**: [`InningsSummary`], [`InningsEnd`], [`MatchResult`], [`MatchCheckpoint`]
//! - **Live stream**: [`LiveMessage`], [`LivePayload`], [`MatchSnapshot`], [`ResumePoint`]
//! - **Commands**: [`ScoringCommand`], [`CommandEnvelope`], [`CommandReply`]
//! - **Configuration**: [`MatchRules`], [`MatchSetup`], [`LiveConfig`]
//! - **Errors**: [`ScoringError`] with `CR_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod ball;
pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod live;
pub mod phase;
pub mod score;
pub mod summary;

pub use ball::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use live::*;
pub use phase::*;
pub use score::*;
pub use summary::*;

// Constants are accessed via `crease_types::constants::FOO`
// (not re-exported to avoid name collisions).
