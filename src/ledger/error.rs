use thiserror::Error;

use crate::ledger::TreasuryError;
use crate::state::{ClaimId, EconomicError, ErrorSeverity, ValidationError};

/// Claim ledger errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Economic(#[from] EconomicError),

    #[error("Claim not found: {0}")]
    ClaimNotFound(ClaimId),

    #[error("Payout for {0} already in flight")]
    Reentrant(ClaimId),

    #[error("Verifier unavailable while resolving {claim_id}: {reason}")]
    VerifierUnavailable { claim_id: ClaimId, reason: String },

    #[error("Treasury error: {0}")]
    Treasury(#[from] TreasuryError),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Reentrant(_)
                | LedgerError::VerifierUnavailable { .. }
                | LedgerError::Treasury(TreasuryError::Unavailable(_))
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LedgerError::Validation(e) => e.severity(),
            LedgerError::Economic(e) => e.severity(),
            LedgerError::ClaimNotFound(_) => ErrorSeverity::Error,
            LedgerError::Reentrant(_) => ErrorSeverity::Warning,
            LedgerError::VerifierUnavailable { .. } => ErrorSeverity::Critical,
            LedgerError::Treasury(_) => ErrorSeverity::Error,
        }
    }
}
