//! Command idempotency guard: a replayed client command id is rejected.
//!
//! Scorer clients retry on timeouts. A retried `record_ball` must not score
//! the ball twice, so every command that carries a [`CommandId`] is
//! remembered once it succeeds. The cache is bounded; the oldest ids are
//! evicted first.

use std::collections::{HashSet, VecDeque};

use crease_types::{CommandId, Result, ScoringError};

/// Bounded memory of applied command ids.
pub struct CommandGuard {
    /// Ids of commands that were applied.
    applied: HashSet<CommandId>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<CommandId>,
    max_size: usize,
}

impl CommandGuard {
    /// Create a guard remembering at most `max_size` ids (at least one).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            applied: HashSet::with_capacity(max_size),
            order: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Fail if `command_id` was already applied.
    ///
    /// # Errors
    /// [`ScoringError::DuplicateCommand`] for a replayed id.
    pub fn check(&self, command_id: CommandId) -> Result<()> {
        if self.applied.contains(&command_id) {
            return Err(ScoringError::DuplicateCommand(command_id));
        }
        Ok(())
    }

    /// Remember an applied command, evicting the oldest at capacity.
    pub fn record(&mut self, command_id: CommandId) {
        if !self.applied.insert(command_id) {
            return;
        }
        if self.order.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.applied.remove(&oldest);
            }
        }
        self.order.push_back(command_id);
    }

    #[must_use]
    pub fn is_applied(&self, command_id: &CommandId) -> bool {
        self.applied.contains(command_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
