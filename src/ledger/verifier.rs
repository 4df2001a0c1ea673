use async_trait::async_trait;
use parity_scale_codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Serialize, Deserialize};
use std::time::Duration;
use thiserror::Error;

use crate::ledger::Claim;
use crate::state::{Amount, CommitmentRoot, Period};

/// Public inputs bound by a tenure proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, TypeInfo)]
pub struct PublicInputs {
    pub commitment_root: [u8; 32],
    pub min_balance: Amount,
    pub start_period: Period,
    pub end_period: Period,
}

impl PublicInputs {
    pub fn new(root: &CommitmentRoot, min_balance: Amount, start_period: Period, end_period: Period) -> Self {
        Self {
            commitment_root: root.0,
            min_balance,
            start_period,
            end_period,
        }
    }

    pub fn from_claim(claim: &Claim) -> Self {
        Self::new(
            &claim.commitment_root,
            claim.min_balance,
            claim.start_period,
            claim.end_period,
        )
    }
}

/// Verifier failures; none of them decide a claim
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("Verifier unavailable: {0}")]
    Unavailable(String),

    #[error("Verifier did not answer within {0:?}")]
    Timeout(Duration),
}

/// External proof verifier, opaque apart from its boolean answer
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, VerifierError>;
}
