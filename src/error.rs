/*!
# Error Module

Crate-level error type aggregating the per-component errors.

## Error Types

Each component reports its own `thiserror` enum:
- [`LedgerError`](crate::ledger::LedgerError) for claim transitions
- [`SamplerError`](crate::sampler::SamplerError) for sampling runs
- [`ObserverError`](crate::observer::ObserverError) for event consumption
- [`SyncError`](crate::sync::SyncError) for reputation propagation
- [`NetworkError`](crate::network::NetworkError) for transports

Synchronous rejections share [`ValidationError`] and
[`EconomicError`]. Every error can be classified with `is_retryable()` and
`severity()`.

```rust
use tenure_protocol::state::{ErrorSeverity, ValidationError};
use tenure_protocol::Error;

let err: Error = ValidationError::ZeroMinimumBalance.into();
assert!(!err.is_retryable());
assert_eq!(err.severity(), ErrorSeverity::Error);
```
*/

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::network::NetworkError;
use crate::observer::{CheckpointError, ObserverError};
use crate::sampler::SamplerError;
use crate::state::{EconomicError, ErrorSeverity, ValidationError};
use crate::sync::SyncError;

/// Core protocol error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Economic error: {0}")]
    Economic(#[from] EconomicError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Observer error: {0}")]
    Observer(#[from] ObserverError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Validation(_) | Error::Economic(_) => false,
            Error::Ledger(e) => e.is_retryable(),
            Error::Sampler(e) => e.is_retryable(),
            Error::Observer(e) => e.is_retryable(),
            Error::Checkpoint(e) => matches!(e, CheckpointError::Io(_)),
            Error::Sync(e) => e.is_retryable(),
            Error::Network(e) => e.is_retryable(),
            Error::Config(_) | Error::Serialization(_) => false,
            Error::Io(_) => true,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::Validation(e) => e.severity(),
            Error::Economic(e) => e.severity(),
            Error::Ledger(e) => e.severity(),
            Error::Sampler(e) => e.severity(),
            Error::Observer(e) => e.severity(),
            Error::Checkpoint(e) => e.severity(),
            Error::Sync(e) => e.severity(),
            Error::Network(e) => e.severity(),
            Error::Config(_) | Error::Serialization(_) | Error::Io(_) => ErrorSeverity::Error,
        }
    }
}
