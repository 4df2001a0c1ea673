use serde::{Serialize, Deserialize};
use parity_scale_codec::{Decode, Encode};
use scale_info::TypeInfo;

use crate::state::{AccountId, Amount, ClaimId, CommitmentRoot, EconomicError, Period, Timestamp};

/// Lifecycle status of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TypeInfo)]
pub enum ClaimStatus {
    /// Inside the challenge window
    Pending,
    /// Disputed; awaiting the verifier
    Challenged,
    /// Terminal: accepted
    Verified,
    /// Terminal: refuted by the verifier
    Rejected,
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Verified | ClaimStatus::Rejected)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (ClaimStatus::Pending, ClaimStatus::Challenged)
                | (ClaimStatus::Pending, ClaimStatus::Verified)
                | (ClaimStatus::Challenged, ClaimStatus::Verified)
                | (ClaimStatus::Challenged, ClaimStatus::Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Challenged => "challenged",
            ClaimStatus::Verified => "verified",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

/// Caller-supplied part of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub min_balance: Amount,
    pub start_period: Period,
    pub end_period: Period,
    pub commitment_root: CommitmentRoot,
}

/// Assertion that `owner` held at least `min_balance` over a period range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub owner: AccountId,
    pub min_balance: Amount,
    pub start_period: Period,
    pub end_period: Period,
    pub commitment_root: CommitmentRoot,
    pub stake: Amount,
    pub submitted_at: Timestamp,
    pub challenge_deadline: Timestamp,
    pub status: ClaimStatus,
}

impl Claim {
    pub fn duration(&self) -> u64 {
        self.end_period - self.start_period
    }

    /// A challenge is admissible up to and including the deadline
    pub fn window_open(&self, now: Timestamp) -> bool {
        now <= self.challenge_deadline
    }

    /// Move to `next`, refusing anything but a forward edge of the lifecycle
    pub(crate) fn advance(&mut self, next: ClaimStatus) -> Result<(), EconomicError> {
        if !self.status.can_transition_to(next) {
            return Err(EconomicError::UnexpectedStatus {
                claim_id: self.id,
                expected: next,
                actual: self.status,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Open dispute against a claim; exists only while the claim is challenged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub claim_id: ClaimId,
    pub challenger: AccountId,
    pub stake: Amount,
    pub submitted_at: Timestamp,
}

/// Outcome of a terminal transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub claim_id: ClaimId,
    pub status: ClaimStatus,
    pub beneficiary: AccountId,
    pub payout: Amount,
    /// Score minted for the owner, when the claim was verified
    pub minted_score: Option<u16>,
}
