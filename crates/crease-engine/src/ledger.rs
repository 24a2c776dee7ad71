//! Ledger Store: the append-only, per-match log of ball events.
//!
//! The store is a dumb ordered log. It assigns sequence numbers (always the
//! event's index) and nothing else: validation lives in the state machine.
//! `append` and `truncate_last` are the only structural writes; annotations
//! patch an already-committed event in place without reordering anything.
//! Lifecycle boundaries the balls cannot express (an innings closed by the
//! scorer, a match ended or abandoned) live in a per-match
//! [`MatchCheckpoint`] saved beside the log.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

#[cfg(any(test, feature = "test-helpers"))]
use std::sync::atomic::{AtomicBool, Ordering};

use crease_types::{
    Annotation, BallEvent, MatchCheckpoint, MatchId, Result, ScoringError, SequenceNumber,
};

/// Storage contract for match ledgers. Durability is the implementor's job.
pub trait LedgerStore: Send + Sync {
    /// Append `event`, assigning it the next sequence number.
    fn append(&self, match_id: MatchId, event: BallEvent) -> Result<SequenceNumber>;

    /// The last `n` events in ledger order (fewer if the ledger is shorter).
    fn last_n(&self, match_id: MatchId, n: usize) -> Result<Vec<BallEvent>>;

    /// Remove and return the last event.
    ///
    /// # Errors
    /// [`ScoringError::LedgerEmpty`] when there is nothing to remove.
    fn truncate_last(&self, match_id: MatchId) -> Result<BallEvent>;

    /// The full ledger, for restore and audit.
    fn load(&self, match_id: MatchId) -> Result<Vec<BallEvent>>;

    fn len(&self, match_id: MatchId) -> Result<u64>;

    /// Attach an annotation to a committed event and return the patched event.
    fn annotate(
        &self,
        match_id: MatchId,
        sequence: SequenceNumber,
        annotation: Annotation,
    ) -> Result<BallEvent>;

    /// Replace the match's lifecycle checkpoint.
    fn save_checkpoint(&self, match_id: MatchId, checkpoint: MatchCheckpoint) -> Result<()>;

    /// The last saved checkpoint, if any.
    fn checkpoint(&self, match_id: MatchId) -> Result<Option<MatchCheckpoint>>;
}

fn poisoned<T>(_: PoisonError<T>) -> ScoringError {
    ScoringError::LedgerUnavailable {
        reason: "ledger lock poisoned".to_string(),
    }
}

/// In-process ledger keyed by match.
///
/// Readers and writers share one `RwLock`, so a reader never observes a
/// half-applied append or truncation.
#[derive(Default)]
pub struct InMemoryLedger {
    logs: RwLock<HashMap<MatchId, Vec<BallEvent>>>,
    checkpoints: RwLock<HashMap<MatchId, MatchCheckpoint>>,
    #[cfg(any(test, feature = "test-helpers"))]
    unavailable: AtomicBool,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of matches with at least one recorded event.
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.logs
            .read()
            .map(|logs| logs.values().filter(|log| !log.is_empty()).count())
            .unwrap_or(0)
    }

    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    fn check_available(&self) -> Result<()> {
        #[cfg(any(test, feature = "test-helpers"))]
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScoringError::LedgerUnavailable {
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl InMemoryLedger {
    /// Make every write fail with [`ScoringError::LedgerUnavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl LedgerStore for InMemoryLedger {
    fn append(&self, match_id: MatchId, mut event: BallEvent) -> Result<SequenceNumber> {
        self.check_available()?;
        let mut logs = self.logs.write().map_err(poisoned)?;
        let log = logs.entry(match_id).or_default();
        let sequence = SequenceNumber::from_index(log.len());
        event.sequence = sequence;
        log.push(event);
        tracing::debug!(%match_id, %sequence, "Ledger append");
        Ok(sequence)
    }

    fn last_n(&self, match_id: MatchId, n: usize) -> Result<Vec<BallEvent>> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs.get(&match_id).map_or_else(Vec::new, |log| {
            log[log.len().saturating_sub(n)..].to_vec()
        }))
    }

    fn truncate_last(&self, match_id: MatchId) -> Result<BallEvent> {
        self.check_available()?;
        let mut logs = self.logs.write().map_err(poisoned)?;
        let removed = logs
            .get_mut(&match_id)
            .and_then(Vec::pop)
            .ok_or(ScoringError::LedgerEmpty(match_id))?;
        tracing::debug!(%match_id, sequence = %removed.sequence, "Ledger truncate");
        Ok(removed)
    }

    fn load(&self, match_id: MatchId) -> Result<Vec<BallEvent>> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs.get(&match_id).cloned().unwrap_or_default())
    }

    fn len(&self, match_id: MatchId) -> Result<u64> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs.get(&match_id).map_or(0, |log| log.len() as u64))
    }

    fn annotate(
        &self,
        match_id: MatchId,
        sequence: SequenceNumber,
        annotation: Annotation,
    ) -> Result<BallEvent> {
        self.check_available()?;
        let mut logs = self.logs.write().map_err(poisoned)?;
        let Some(log) = logs.get_mut(&match_id) else {
            return Err(ScoringError::SequenceOutOfRange { sequence, len: 0 });
        };
        let len = log.len() as u64;
        let event = log
            .get_mut(sequence.index())
            .ok_or(ScoringError::SequenceOutOfRange { sequence, len })?;
        event.annotation = Some(annotation);
        Ok(event.clone())
    }

    fn save_checkpoint(&self, match_id: MatchId, checkpoint: MatchCheckpoint) -> Result<()> {
        self.check_available()?;
        let mut checkpoints = self.checkpoints.write().map_err(poisoned)?;
        tracing::debug!(
            %match_id,
            phase = %checkpoint.phase,
            ledger_len = checkpoint.ledger_len,
            "Checkpoint saved"
        );
        checkpoints.insert(match_id, checkpoint);
        Ok(())
    }

    fn checkpoint(&self, match_id: MatchId) -> Result<Option<MatchCheckpoint>> {
        let checkpoints = self.checkpoints.read().map_err(poisoned)?;
        Ok(checkpoints.get(&match_id).cloned())
    }
}
