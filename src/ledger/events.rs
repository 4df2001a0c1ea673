use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;

use crate::ledger::{Claim, ClaimStatus};
use crate::state::{AccountId, Amount, ClaimId, Timestamp};

/// Default capacity of the live event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// What happened on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    ClaimSubmitted {
        claim: Claim,
    },
    ClaimChallenged {
        claim_id: ClaimId,
        challenger: AccountId,
        stake: Amount,
    },
    ClaimResolved {
        claim_id: ClaimId,
        status: ClaimStatus,
        beneficiary: AccountId,
        payout: Amount,
    },
    ClaimFinalized {
        claim_id: ClaimId,
        payout: Amount,
    },
    ReputationMinted {
        claim_id: ClaimId,
        subject: AccountId,
        score: u16,
    },
}

impl LedgerEventKind {
    pub fn claim_id(&self) -> ClaimId {
        match self {
            LedgerEventKind::ClaimSubmitted { claim } => claim.id,
            LedgerEventKind::ClaimChallenged { claim_id, .. }
            | LedgerEventKind::ClaimResolved { claim_id, .. }
            | LedgerEventKind::ClaimFinalized { claim_id, .. }
            | LedgerEventKind::ReputationMinted { claim_id, .. } => *claim_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEventKind::ClaimSubmitted { .. } => "claim_submitted",
            LedgerEventKind::ClaimChallenged { .. } => "claim_challenged",
            LedgerEventKind::ClaimResolved { .. } => "claim_resolved",
            LedgerEventKind::ClaimFinalized { .. } => "claim_finalized",
            LedgerEventKind::ReputationMinted { .. } => "reputation_minted",
        }
    }
}

/// Positioned ledger event; positions start at zero and have no gaps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub position: u64,
    pub timestamp: Timestamp,
    pub kind: LedgerEventKind,
}

/// Append-only ledger event log with a live broadcast feed
#[derive(Debug)]
pub struct EventLog {
    events: RwLock<Vec<LedgerEvent>>,
    live: broadcast::Sender<LedgerEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

impl EventLog {
    pub fn new(channel_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            events: RwLock::new(Vec::new()),
            live,
        }
    }

    /// Append an event and publish it to live subscribers
    pub fn append(&self, timestamp: Timestamp, kind: LedgerEventKind) -> LedgerEvent {
        let mut events = self.events.write();
        let event = LedgerEvent {
            position: events.len() as u64,
            timestamp,
            kind,
        };
        events.push(event.clone());
        // no subscribers is fine
        let _ = self.live.send(event.clone());
        event
    }

    /// Up to `limit` events starting at `from`
    pub fn fetch(&self, from: u64, limit: usize) -> Vec<LedgerEvent> {
        let events = self.events.read();
        let start = (from as usize).min(events.len());
        events[start..].iter().take(limit).cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.live.subscribe()
    }

    /// Position the next event will get
    pub fn head(&self) -> u64 {
        self.events.read().len() as u64
    }
}
