use serde::{Serialize, Deserialize};
use std::time::Duration;

use crate::network::RetryConfig;
use crate::observer::ProfitModel;

/// Chain observer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Events fetched per replay batch
    pub batch_size: usize,
    /// Replay batches between durable checkpoints
    pub checkpoint_every_batches: u64,
    /// Live events between durable checkpoints
    pub checkpoint_every_events: u64,
    /// Silence on the live feed after which the source is polled
    pub idle_timeout: Duration,
    /// Upper bound on concurrent claim validations
    pub max_concurrent_validations: usize,
    /// Retry policy for historical fetches
    pub source_retry: RetryConfig,
    /// Backoff between live subscription attempts; never gives up
    pub reconnect: RetryConfig,
    pub profit: ProfitModel,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            checkpoint_every_batches: 10,
            checkpoint_every_events: 100,
            idle_timeout: Duration::from_secs(30),
            max_concurrent_validations: 8,
            source_retry: RetryConfig::default(),
            reconnect: RetryConfig {
                max_attempts: u32::MAX,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(60),
                backoff_factor: 2.0,
                jitter_factor: 0.2,
            },
            profit: ProfitModel::default(),
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be positive".into());
        }
        if self.checkpoint_every_batches == 0 || self.checkpoint_every_events == 0 {
            return Err("checkpoint intervals must be positive".into());
        }
        if self.max_concurrent_validations == 0 {
            return Err("max_concurrent_validations must be positive".into());
        }
        if self.max_concurrent_validations > u32::MAX as usize {
            return Err("max_concurrent_validations is too large".into());
        }
        if self.idle_timeout.is_zero() {
            return Err("idle_timeout must be positive".into());
        }
        Ok(())
    }
}
