//! Shared protocol state types.
//!
//! Identifiers, amounts and the synchronous rejection errors
//! ([`ValidationError`], [`EconomicError`]) used across every component.

pub mod types;
pub mod error;

pub use types::{AccountId, Amount, ChainId, ClaimId, CommitmentRoot, Period, Timestamp};
pub use error::{EconomicError, ErrorSeverity, ValidationError};
