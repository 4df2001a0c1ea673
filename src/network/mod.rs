//! Transport seam and retry/backoff shared by the sampler, observer and sync layers.

mod transport;
mod error;
pub mod retry;

pub use transport::{Transport, TransportAttempt, TransportMetrics};
pub use error::NetworkError;
pub use retry::{ExponentialBackoff, RetryConfig, RetryMetrics, RetryPolicy, Retryable, with_retry};
