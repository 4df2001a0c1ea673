use serde::{Serialize, Deserialize};
use std::time::Duration;

use crate::ledger::events::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::state::Amount;

/// Claim ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Length of the challenge window after submission, in seconds
    pub challenge_window_secs: u64,
    /// Minimum stake escrowed with a claim
    pub min_claim_stake: Amount,
    /// Minimum stake escrowed with a challenge
    pub min_challenge_stake: Amount,
    /// Bound on a single verifier call during resolve
    pub verifier_timeout: Duration,
    /// Capacity of the live event channel
    pub event_channel_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            challenge_window_secs: 7 * 24 * 60 * 60,
            min_claim_stake: 1_000_000_000_000_000,
            min_challenge_stake: 1_000_000_000_000_000,
            verifier_timeout: Duration::from_secs(30),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.challenge_window_secs == 0 {
            return Err("challenge_window_secs must be positive".into());
        }
        if self.verifier_timeout.is_zero() {
            return Err("verifier_timeout must be positive".into());
        }
        if self.event_channel_capacity == 0 {
            return Err("event_channel_capacity must be positive".into());
        }
        Ok(())
    }
}
