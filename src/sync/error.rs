use thiserror::Error;

use crate::state::{AccountId, ChainId, ErrorSeverity, ValidationError};

/// Reputation sync errors.
///
/// Delivery failures never appear here; they are reported per destination.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} is already blacklisted")]
    AlreadyBlacklisted(AccountId),

    #[error("{0} is not blacklisted")]
    NotBlacklisted(AccountId),

    #[error("Chain {chain} needs at least {required} transports, got {provided}")]
    InsufficientTransports {
        chain: ChainId,
        required: usize,
        provided: usize,
    },

    #[error("Undecodable cross-chain payload: {0}")]
    Decode(String),

    #[error("Sequence store failed: {0}")]
    Persistence(String),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Persistence(_))
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::AlreadyBlacklisted(_) | SyncError::NotBlacklisted(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}
