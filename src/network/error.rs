use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::state::ErrorSeverity;

/// Cross-chain transport errors
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    #[error("Destination unreachable: {0}")]
    Unreachable(String),

    #[error("Delivery rejected by destination: {0}")]
    Rejected(String),

    #[error("Failed to send message: {0}")]
    MessageSendFailed(String),

    #[error("Failed to encode payload: {0}")]
    Encoding(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("No transport registered for {0}")]
    NoTransport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NetworkError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetworkError::Unreachable(_) |
            NetworkError::MessageSendFailed(_) |
            NetworkError::Timeout(_)
        )
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            NetworkError::Unreachable(_) => ErrorSeverity::Warning,
            NetworkError::Rejected(_) => ErrorSeverity::Error,
            NetworkError::MessageSendFailed(_) => ErrorSeverity::Warning,
            NetworkError::Encoding(_) => ErrorSeverity::Critical,
            NetworkError::Timeout(_) => ErrorSeverity::Warning,
            NetworkError::NoTransport(_) => ErrorSeverity::Error,
            NetworkError::Internal(_) => ErrorSeverity::Critical,
        }
    }
}

impl crate::network::retry::Retryable for NetworkError {
    fn is_retryable(&self) -> bool {
        NetworkError::is_retryable(self)
    }
}
