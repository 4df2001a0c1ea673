use serde::{Serialize, Deserialize};
use std::time::Duration;

use crate::network::RetryConfig;

/// Blocks per day on the reference ledger
pub const DEFAULT_PERIODS_PER_DAY: u64 = 6_500;

/// Weekly sampling
pub const DEFAULT_SAMPLES_PER_YEAR: u64 = 52;

/// Minimum absolute distance between two sample points, in base periods
pub const DEFAULT_MIN_GAP: u64 = 100;

/// Temporal sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Target sampling density
    pub samples_per_year: u64,
    /// Base periods (blocks) per year
    pub periods_per_year: u64,
    /// Anti-manipulation gap between sample points
    pub min_gap: u64,
    /// Upper bound on in-flight historical queries per run
    pub max_concurrent_queries: usize,
    /// Timeout for a single historical query
    pub query_timeout: Duration,
    /// Retry policy for historical queries
    pub retry: RetryConfig,
    /// Reputation score parameters
    pub score: ScoreConfig,
}

/// Reputation score parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Upper bound of the score; each component is capped at half of it
    pub max_score: u16,
    /// Saturation constant of the duration component, in months
    pub duration_scale_months: f64,
    /// Weight `k` of the logarithmic balance component (balance in base units)
    pub balance_log_weight: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            max_score: 1000,
            duration_scale_months: 36.0,
            balance_log_weight: 15.5,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples_per_year: DEFAULT_SAMPLES_PER_YEAR,
            periods_per_year: DEFAULT_PERIODS_PER_DAY * 365,
            min_gap: DEFAULT_MIN_GAP,
            max_concurrent_queries: 16,
            query_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            score: ScoreConfig::default(),
        }
    }
}

impl SamplerConfig {
    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.samples_per_year == 0 {
            return Err("samples_per_year must be positive".into());
        }
        if self.periods_per_year < 12 {
            return Err("periods_per_year must cover at least one period per month".into());
        }
        if self.min_gap == 0 {
            return Err("min_gap must be positive".into());
        }
        if self.max_concurrent_queries == 0 {
            return Err("max_concurrent_queries must be positive".into());
        }
        if self.score.max_score == 0 || self.score.duration_scale_months <= 0.0 {
            return Err("score parameters must be positive".into());
        }
        if self.score.balance_log_weight < 0.0 {
            return Err("balance_log_weight must not be negative".into());
        }
        Ok(())
    }
}
