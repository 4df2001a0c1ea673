use thiserror::Error;
use std::cmp::Ordering;
use serde::{Serialize, Deserialize};

use crate::state::{ClaimId, Period, Timestamp};
use crate::ledger::ClaimStatus;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Warning - operation can continue
    Warning,
    /// Error - operation failed but can be retried
    Error,
    /// Critical - operation failed and should not be retried
    Critical,
}

impl PartialOrd for ErrorSeverity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ErrorSeverity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl ErrorSeverity {
    fn rank(&self) -> u8 {
        match self {
            ErrorSeverity::Warning => 0,
            ErrorSeverity::Error => 1,
            ErrorSeverity::Critical => 2,
        }
    }
}

/// Malformed input, rejected synchronously and never persisted
#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid period range: end {end} must be after start {start}")]
    InvalidPeriodRange { start: Period, end: Period },

    #[error("End period {end} is in the future (current period {current})")]
    FutureEndPeriod { end: Period, current: Period },

    #[error("Sample gap {gap} is below the minimum gap of {min_gap} periods")]
    InsufficientSampleGap { gap: u64, min_gap: u64 },

    #[error("Severity {severity} outside the allowed range [{min}, {max}]")]
    SeverityOutOfRange { severity: u8, min: u8, max: u8 },

    #[error("Stake {provided} below the required minimum {required}")]
    StakeTooLow { provided: u128, required: u128 },

    #[error("Zero minimum balance is not a claim")]
    ZeroMinimumBalance,
}

/// Economically invalid action, rejected synchronously with the stake untouched
#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum EconomicError {
    #[error("Challenge window for {claim_id} closed at {deadline} (now {now})")]
    ChallengeWindowClosed {
        claim_id: ClaimId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("Challenge window for {claim_id} still open until {deadline} (now {now})")]
    ChallengeWindowOpen {
        claim_id: ClaimId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("{claim_id} is {actual:?}, expected {expected:?}")]
    UnexpectedStatus {
        claim_id: ClaimId,
        expected: ClaimStatus,
        actual: ClaimStatus,
    },

    #[error("Owner of {claim_id} cannot challenge their own claim")]
    SelfChallenge { claim_id: ClaimId },
}

impl ValidationError {
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

impl EconomicError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EconomicError::ChallengeWindowOpen { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}
