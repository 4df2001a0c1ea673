use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ledger::{Claim, ClaimStatus, LedgerEvent, LedgerEventKind};
use crate::state::ClaimId;

/// Result of applying one event to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Already applied; skipped
    Duplicate,
    /// Ahead of the cursor; earlier events are missing
    Gap { expected: u64 },
}

/// Local copy of the non-terminal claims on the ledger.
///
/// Events are applied strictly in position order; re-applying an event is a
/// no-op. Claims are dropped once they reach a terminal status.
#[derive(Debug, Default)]
pub struct ClaimMirror {
    claims: DashMap<ClaimId, Claim>,
    next_position: AtomicU64,
}

impl ClaimMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror restored from a checkpoint
    pub fn restore(cursor: u64, open_claims: Vec<Claim>) -> Self {
        let mirror = Self::new();
        mirror.reset_to(cursor, open_claims);
        mirror
    }

    pub fn reset_to(&self, cursor: u64, open_claims: Vec<Claim>) {
        self.claims.clear();
        for claim in open_claims {
            self.claims.insert(claim.id, claim);
        }
        self.next_position.store(cursor, Ordering::SeqCst);
    }

    pub fn next_position(&self) -> u64 {
        self.next_position.load(Ordering::SeqCst)
    }

    pub fn apply(&self, event: &LedgerEvent) -> ApplyOutcome {
        let expected = self.next_position();
        if event.position < expected {
            return ApplyOutcome::Duplicate;
        }
        if event.position > expected {
            return ApplyOutcome::Gap { expected };
        }

        match &event.kind {
            LedgerEventKind::ClaimSubmitted { claim } => {
                self.claims.insert(claim.id, claim.clone());
            }
            LedgerEventKind::ClaimChallenged { claim_id, .. } => {
                if let Some(mut claim) = self.claims.get_mut(claim_id) {
                    claim.status = ClaimStatus::Challenged;
                }
            }
            LedgerEventKind::ClaimResolved { claim_id, .. }
            | LedgerEventKind::ClaimFinalized { claim_id, .. } => {
                self.claims.remove(claim_id);
            }
            LedgerEventKind::ReputationMinted { .. } => {}
        }

        self.next_position.store(event.position + 1, Ordering::SeqCst);
        ApplyOutcome::Applied
    }

    pub fn get(&self, claim_id: ClaimId) -> Option<Claim> {
        self.claims.get(&claim_id).map(|c| c.clone())
    }

    /// Pending claims, ascending by id
    pub fn pending(&self) -> Vec<Claim> {
        let mut pending: Vec<Claim> = self
            .claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Pending)
            .map(|c| c.clone())
            .collect();
        pending.sort_by_key(|c| c.id);
        pending
    }

    /// Every mirrored claim, ascending by id
    pub fn snapshot(&self) -> Vec<Claim> {
        let mut claims: Vec<Claim> = self.claims.iter().map(|c| c.clone()).collect();
        claims.sort_by_key(|c| c.id);
        claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
