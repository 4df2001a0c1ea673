use serde::{Serialize, Deserialize};
use std::future::Future;
use std::time::Duration;
use rand::Rng;
use tracing::debug;

/// Errors that know whether another attempt can succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry policy for remote operations
pub trait RetryPolicy: Send + Sync {
    /// Check if the failed attempt number `attempt` (1-based) should be retried
    fn should_retry(&self, attempt: u32, retryable: bool) -> bool;

    /// Get delay before the next attempt
    fn delay(&self, attempt: u32) -> Duration;

    /// Get retry metrics
    fn metrics(&self) -> RetryMetrics;

    /// Record the final outcome of a retried operation
    fn record_outcome(&self, attempts: u32, success: bool);
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Immediate retries with no sleep, for tests and tight loops
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter_factor: 0.0,
        }
    }
}

/// Retry metrics
#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
    pub average_attempts: f64,
    operations: u64,
}

/// Exponential backoff with jitter
pub struct ExponentialBackoff {
    config: RetryConfig,
    metrics: parking_lot::RwLock<RetryMetrics>,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: parking_lot::RwLock::new(RetryMetrics::default()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn calculate_exponential_backoff(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_secs_f64();
        let max_delay = self.config.max_delay.as_secs_f64();
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let backoff = base_delay * self.config.backoff_factor.powi(exponent);

        let jitter_range = backoff * self.config.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let delay = (backoff + jitter).clamp(0.0, max_delay);

        Duration::from_secs_f64(delay)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt < self.config.max_attempts
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.calculate_exponential_backoff(attempt)
    }

    fn metrics(&self) -> RetryMetrics {
        self.metrics.read().clone()
    }

    fn record_outcome(&self, attempts: u32, success: bool) {
        let mut metrics = self.metrics.write();
        metrics.operations += 1;
        metrics.average_attempts = crate::metrics::MetricsUtils::update_average(
            metrics.average_attempts,
            attempts as f64,
            metrics.operations,
        );
        if attempts > 1 {
            metrics.total_retries += (attempts - 1) as u64;
            if success {
                metrics.successful_retries += 1;
            } else {
                metrics.failed_retries += 1;
            }
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// policy gives up. The closure receives the 1-based attempt number.
pub async fn with_retry<T, E, F, Fut>(
    policy: &dyn RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => {
                policy.record_outcome(attempt, true);
                return Ok(result);
            }
            Err(error) => {
                if !policy.should_retry(attempt, error.is_retryable()) {
                    policy.record_outcome(attempt, false);
                    return Err(error);
                }
                let delay = policy.delay(attempt);
                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after failure"
                );
                metrics::increment_counter!(crate::metrics::names::RETRY_ATTEMPTS, "operation" => operation_name.to_string());
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
