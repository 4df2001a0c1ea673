use std::time::Duration;
use thiserror::Error;

use crate::network::Retryable;
use crate::state::{ErrorSeverity, Period, ValidationError};

/// Historical balance query failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("Balance history unavailable: {0}")]
    Unavailable(String),

    #[error("Balance query for period {period} timed out after {after:?}")]
    Timeout { period: Period, after: Duration },

    #[error("Malformed balance response: {0}")]
    Malformed(String),
}

impl Retryable for DataSourceError {
    fn is_retryable(&self) -> bool {
        matches!(self, DataSourceError::Unavailable(_) | DataSourceError::Timeout { .. })
    }
}

/// Sampler errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("Invalid sampling request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Balance query for period {period} failed: {source}")]
    DataSource {
        period: Period,
        #[source]
        source: DataSourceError,
    },
}

impl SamplerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SamplerError::Validation(_) => false,
            SamplerError::DataSource { source, .. } => source.is_retryable(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SamplerError::Validation(_) => ErrorSeverity::Error,
            SamplerError::DataSource { .. } => ErrorSeverity::Warning,
        }
    }
}
