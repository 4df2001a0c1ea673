use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::ledger::{ClaimLedger, EventLog, LedgerEvent};
use crate::observer::ObserverError;
use crate::state::{AccountId, Amount, ClaimId};

/// Ordered stream of ledger events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Up to `limit` historical events starting at position `from`
    async fn fetch(&self, from: u64, limit: usize) -> Result<Vec<LedgerEvent>, ObserverError>;

    /// Live feed of events appended from now on
    async fn subscribe(&self) -> Result<broadcast::Receiver<LedgerEvent>, ObserverError>;
}

/// Event source reading an in-process ledger event log
pub struct LedgerEventSource {
    log: Arc<EventLog>,
}

impl LedgerEventSource {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl EventSource for LedgerEventSource {
    async fn fetch(&self, from: u64, limit: usize) -> Result<Vec<LedgerEvent>, ObserverError> {
        Ok(self.log.fetch(from, limit))
    }

    async fn subscribe(&self) -> Result<broadcast::Receiver<LedgerEvent>, ObserverError> {
        Ok(self.log.subscribe())
    }
}

/// Where the observer sends its disputes
#[async_trait]
pub trait ChallengeSubmitter: Send + Sync {
    async fn submit_challenge(&self, claim_id: ClaimId, stake: Amount) -> Result<(), ObserverError>;
}

/// Challenges submitted directly to a claim ledger under one account
pub struct LedgerChallenger {
    ledger: Arc<ClaimLedger>,
    challenger: AccountId,
}

impl LedgerChallenger {
    pub fn new(ledger: Arc<ClaimLedger>, challenger: AccountId) -> Self {
        Self { ledger, challenger }
    }
}

#[async_trait]
impl ChallengeSubmitter for LedgerChallenger {
    async fn submit_challenge(&self, claim_id: ClaimId, stake: Amount) -> Result<(), ObserverError> {
        self.ledger
            .challenge(claim_id, self.challenger.clone(), stake)
            .await
            .map_err(ObserverError::from)
    }
}
