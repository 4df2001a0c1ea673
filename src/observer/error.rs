use thiserror::Error;

use crate::ledger::LedgerError;
use crate::network::Retryable;
use crate::sampler::SamplerError;
use crate::state::ErrorSeverity;

/// Checkpoint persistence errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("Checkpoint I/O failed: {0}")]
    Io(String),

    #[error("Checkpoint corrupted: {0}")]
    Corrupted(String),

    #[error("Checkpoint serialization failed: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        CheckpointError::Io(err.to_string())
    }
}

impl CheckpointError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CheckpointError::Corrupted(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Chain observer errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("Event source error: {0}")]
    Source(String),

    #[error("Event subscription closed")]
    SubscriptionClosed,

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("Challenge submission failed: {0}")]
    Challenge(#[from] LedgerError),
}

impl Retryable for ObserverError {
    fn is_retryable(&self) -> bool {
        match self {
            ObserverError::Source(_) | ObserverError::SubscriptionClosed => true,
            ObserverError::Checkpoint(CheckpointError::Io(_)) => true,
            ObserverError::Sampler(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl ObserverError {
    pub fn is_retryable(&self) -> bool {
        Retryable::is_retryable(self)
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ObserverError::Source(_) | ObserverError::SubscriptionClosed => ErrorSeverity::Warning,
            ObserverError::Checkpoint(e) => e.severity(),
            ObserverError::Sampler(e) => e.severity(),
            ObserverError::Challenge(e) => e.severity(),
        }
    }
}
