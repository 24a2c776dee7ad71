//! Ledger digest: a SHA-256 hash chain over a ledger prefix.
//!
//! Every replica folding the same ledger prefix must arrive at the same
//! digest. The chain form lets the [`Aggregator`](crate::Aggregator) extend
//! the digest one event at a time while a full replay recomputes it from
//! scratch; the two must agree.
//!
//! Annotations and timestamps are excluded: they never change the score.

use crease_types::{BallEvent, DismissalKind, ExtraKind};
use sha2::{Digest, Sha256};

const DOMAIN: &[u8] = b"crease:ledger:v1:";

/// Incremental hash chain over ball events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerDigest {
    head: [u8; 32],
}

impl LedgerDigest {
    /// Digest of the empty ledger.
    #[must_use]
    pub fn genesis() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        hasher.update(b"genesis");
        Self {
            head: hasher.finalize().into(),
        }
    }

    /// Extend the chain with the next event.
    pub fn push(&mut self, event: &BallEvent) {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        hasher.update(self.head);
        hasher.update(event.sequence.0.to_le_bytes());
        hasher.update([event.position.innings]);
        hasher.update(event.position.over.to_le_bytes());
        hasher.update([event.position.ball_in_over, event.runs_off_bat]);
        match event.extra {
            Some(extra) => hasher.update([1, extra_code(extra.kind), extra.runs]),
            None => hasher.update([0]),
        }
        match event.wicket {
            Some(wicket) => {
                hasher.update([1, dismissal_code(wicket.kind)]);
                hasher.update(wicket.batter.0.as_bytes());
            }
            None => hasher.update([0]),
        }
        hasher.update(event.striker.0.as_bytes());
        hasher.update(event.non_striker.0.as_bytes());
        hasher.update(event.bowler.0.as_bytes());
        self.head = hasher.finalize().into();
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.head
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.head)
    }
}

impl Default for LedgerDigest {
    fn default() -> Self {
        Self::genesis()
    }
}

fn extra_code(kind: ExtraKind) -> u8 {
    match kind {
        ExtraKind::Wide => 0,
        ExtraKind::NoBall => 1,
        ExtraKind::Bye => 2,
        ExtraKind::LegBye => 3,
    }
}

fn dismissal_code(kind: DismissalKind) -> u8 {
    match kind {
        DismissalKind::Bowled => 0,
        DismissalKind::Caught => 1,
        DismissalKind::RunOut => 2,
        DismissalKind::Stumped => 3,
        DismissalKind::Lbw => 4,
        DismissalKind::HitWicket => 5,
        DismissalKind::Retired => 6,
        DismissalKind::Other => 7,
    }
}

/// Compute the digest of a whole ledger prefix.
#[must_use]
pub fn compute_ledger_digest(events: &[BallEvent]) -> LedgerDigest {
    let mut digest = LedgerDigest::genesis();
    for event in events {
        digest.push(event);
    }
    digest
}

/// Verify a hex digest against a ledger prefix.
#[must_use]
pub fn verify_ledger_digest(events: &[BallEvent], expected_hex: &str) -> bool {
    compute_ledger_digest(events).to_hex() == expected_hex
}
