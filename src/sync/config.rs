use serde::{Serialize, Deserialize};
use std::time::Duration;

use crate::network::RetryConfig;
use crate::state::ChainId;

pub const MIN_SLASH_SEVERITY: u8 = 20;
pub const MAX_SLASH_SEVERITY: u8 = 100;

/// Reputation sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Identity stamped on outbound payloads
    pub local_chain: ChainId,
    pub min_severity: u8,
    pub max_severity: u8,
    /// Bound on one transport attempt to one destination
    pub delivery_timeout: Duration,
    /// Retries of one transport before falling back to the next
    pub transport_retry: RetryConfig,
    /// Transports each destination must register
    pub min_transports_per_chain: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_chain: ChainId::default(),
            min_severity: MIN_SLASH_SEVERITY,
            max_severity: MAX_SLASH_SEVERITY,
            delivery_timeout: Duration::from_secs(15),
            transport_retry: RetryConfig {
                max_attempts: 2,
                ..RetryConfig::default()
            },
            min_transports_per_chain: 2,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_severity == 0 || self.min_severity > self.max_severity || self.max_severity > 100 {
            return Err("severity range must lie within [1, 100]".into());
        }
        if self.delivery_timeout.is_zero() {
            return Err("delivery_timeout must be positive".into());
        }
        if self.min_transports_per_chain == 0 {
            return Err("at least one transport per chain is required".into());
        }
        Ok(())
    }
}
