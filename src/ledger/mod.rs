/*!
# Claim Ledger

Owns claim records and escrowed stakes and exposes the claim lifecycle as
atomic state transitions.

## Lifecycle

```text
            challenge              resolve(true)
  Pending ─────────────▶ Challenged ─────────────▶ Verified
     │                        │
     │ finalize (after        │ resolve(false)
     │ the deadline)          ▼
     └──────────────▶ Verified       Rejected
```

- `submit` validates the period range, the end period against the current
  ledger period and the implied sampling density, escrows the owner's stake
  and opens the challenge window.
- `challenge` escrows the challenger's stake while the window is open
  (the deadline itself is still inside the window).
- `resolve` asks the external [`ProofVerifier`] about the claim's public
  inputs. The winner receives both stakes.
- `finalize` returns the owner's stake once the deadline has passed.

Verified claims mint a reputation score into the shared [`ReputationBook`],
unless the owner is blacklisted: a slashed subject keeps its cut score until
it is restored.

## Atomicity

Each claim sits behind its own async mutex, so transitions of one claim are
serialized while distinct claims proceed in parallel. A payout happens
before the status commit while the lock is held; if the payout fails the
status is unchanged. Calls on a claim whose payout is in flight are rejected
with [`LedgerError::Reentrant`] instead of waiting on the lock.

Every transition is appended to the [`EventLog`], the only channel through
which observers learn about claims.
*/

mod claim;
mod clock;
mod config;
mod error;
pub mod events;
mod reputation;
mod treasury;
mod verifier;

pub use claim::{Challenge, Claim, ClaimStatus, ClaimSubmission, Settlement};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use events::{EventLog, LedgerEvent, LedgerEventKind};
pub use reputation::{BlacklistEntry, ReputationBook, ReputationRecord};
pub use treasury::{InMemoryTreasury, Treasury, TreasuryError};
pub use verifier::{ProofVerifier, PublicInputs, VerifierError};

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::metrics::names;
use crate::sampler::{check_density, reputation_score, SamplerConfig};
use crate::state::{AccountId, Amount, ClaimId, EconomicError, Timestamp, ValidationError};

#[derive(Debug)]
struct ClaimEntry {
    claim: Claim,
    challenge: Option<Challenge>,
}

/// Marks a claim's payout as in flight for as long as it lives
struct PayoutGuard<'a> {
    in_flight: &'a DashSet<ClaimId>,
    claim_id: ClaimId,
}

impl<'a> PayoutGuard<'a> {
    fn acquire(in_flight: &'a DashSet<ClaimId>, claim_id: ClaimId) -> Result<Self, LedgerError> {
        if !in_flight.insert(claim_id) {
            return Err(LedgerError::Reentrant(claim_id));
        }
        Ok(Self { in_flight, claim_id })
    }
}

impl Drop for PayoutGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.claim_id);
    }
}

/// Optimistic claim ledger
pub struct ClaimLedger {
    config: LedgerConfig,
    sampling: SamplerConfig,
    verifier: Arc<dyn ProofVerifier>,
    treasury: Arc<dyn Treasury>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    reputation: Arc<ReputationBook>,
    claims: DashMap<ClaimId, Arc<Mutex<ClaimEntry>>>,
    next_id: AtomicU64,
    payouts_in_flight: DashSet<ClaimId>,
}

impl ClaimLedger {
    pub fn new(
        config: LedgerConfig,
        sampling: SamplerConfig,
        verifier: Arc<dyn ProofVerifier>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = Arc::new(EventLog::new(config.event_channel_capacity));
        Self {
            config,
            sampling,
            verifier,
            treasury,
            clock,
            events,
            reputation: Arc::new(ReputationBook::new()),
            claims: DashMap::new(),
            next_id: AtomicU64::new(1),
            payouts_in_flight: DashSet::new(),
        }
    }

    /// Share an existing reputation book instead of a private one
    pub fn with_reputation(mut self, reputation: Arc<ReputationBook>) -> Self {
        self.reputation = reputation;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventLog> {
        self.events.clone()
    }

    pub fn reputation(&self) -> Arc<ReputationBook> {
        self.reputation.clone()
    }

    /// Submit a claim with an escrowed stake
    pub async fn submit(
        &self,
        owner: AccountId,
        submission: ClaimSubmission,
        stake: Amount,
    ) -> Result<ClaimId, LedgerError> {
        self.validate_submission(&submission, stake)?;
        self.treasury.collect(&owner, stake).await?;

        let now = self.clock.now();
        let id = ClaimId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let claim = Claim {
            id,
            owner,
            min_balance: submission.min_balance,
            start_period: submission.start_period,
            end_period: submission.end_period,
            commitment_root: submission.commitment_root,
            stake,
            submitted_at: now,
            challenge_deadline: now.saturating_add(self.config.challenge_window_secs),
            status: ClaimStatus::Pending,
        };

        // held until ClaimSubmitted is logged, so no transition can precede it
        let handle = Arc::new(Mutex::new(ClaimEntry {
            claim: claim.clone(),
            challenge: None,
        }));
        let locked = handle.clone().lock_owned().await;
        self.claims.insert(id, handle);

        info!(
            claim_id = %id,
            owner = %claim.owner,
            start = claim.start_period,
            end = claim.end_period,
            deadline = claim.challenge_deadline,
            "claim submitted"
        );
        metrics::increment_counter!(names::CLAIMS_SUBMITTED);
        metrics::gauge!(names::ESCROWED_TOTAL, self.treasury.escrowed() as f64);
        self.events.append(now, LedgerEventKind::ClaimSubmitted { claim });
        drop(locked);

        Ok(id)
    }

    /// Dispute a pending claim with an escrowed stake
    pub async fn challenge(
        &self,
        claim_id: ClaimId,
        challenger: AccountId,
        stake: Amount,
    ) -> Result<(), LedgerError> {
        let handle = self.entry(claim_id)?;
        self.ensure_not_paying(claim_id)?;
        let mut entry = handle.lock().await;
        let now = self.clock.now();

        if entry.claim.status != ClaimStatus::Pending {
            return Err(EconomicError::UnexpectedStatus {
                claim_id,
                expected: ClaimStatus::Pending,
                actual: entry.claim.status,
            }
            .into());
        }
        if !entry.claim.window_open(now) {
            return Err(EconomicError::ChallengeWindowClosed {
                claim_id,
                deadline: entry.claim.challenge_deadline,
                now,
            }
            .into());
        }
        if challenger == entry.claim.owner {
            return Err(EconomicError::SelfChallenge { claim_id }.into());
        }
        if stake < self.config.min_challenge_stake {
            return Err(ValidationError::StakeTooLow {
                provided: stake,
                required: self.config.min_challenge_stake,
            }
            .into());
        }

        self.treasury.collect(&challenger, stake).await?;
        entry.claim.advance(ClaimStatus::Challenged)?;
        entry.challenge = Some(Challenge {
            claim_id,
            challenger: challenger.clone(),
            stake,
            submitted_at: now,
        });

        info!(claim_id = %claim_id, challenger = %challenger, stake, "claim challenged");
        Self::record_transition(ClaimStatus::Challenged);
        metrics::gauge!(names::ESCROWED_TOTAL, self.treasury.escrowed() as f64);
        self.events.append(
            now,
            LedgerEventKind::ClaimChallenged {
                claim_id,
                challenger,
                stake,
            },
        );
        Ok(())
    }

    /// Settle a challenged claim with the external verifier's answer.
    ///
    /// If the verifier cannot answer the claim stays challenged and
    /// [`LedgerError::VerifierUnavailable`] is returned.
    pub async fn resolve(&self, claim_id: ClaimId, proof: &[u8]) -> Result<Settlement, LedgerError> {
        let handle = self.entry(claim_id)?;
        self.ensure_not_paying(claim_id)?;
        let mut entry = handle.lock().await;

        let challenge = match (&entry.claim.status, &entry.challenge) {
            (ClaimStatus::Challenged, Some(challenge)) => challenge.clone(),
            (actual, _) => {
                return Err(EconomicError::UnexpectedStatus {
                    claim_id,
                    expected: ClaimStatus::Challenged,
                    actual: *actual,
                }
                .into())
            }
        };

        let inputs = PublicInputs::from_claim(&entry.claim);
        let timeout = self.config.verifier_timeout;
        let verified = match tokio::time::timeout(timeout, self.verifier.verify(proof, &inputs)).await {
            Ok(Ok(verified)) => verified,
            Ok(Err(e)) => {
                error!(claim_id = %claim_id, error = %e, "verifier failed, claim stays challenged");
                return Err(LedgerError::VerifierUnavailable {
                    claim_id,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                error!(claim_id = %claim_id, ?timeout, "verifier timed out, claim stays challenged");
                return Err(LedgerError::VerifierUnavailable {
                    claim_id,
                    reason: VerifierError::Timeout(timeout).to_string(),
                });
            }
        };

        let (status, beneficiary) = if verified {
            (ClaimStatus::Verified, entry.claim.owner.clone())
        } else {
            (ClaimStatus::Rejected, challenge.challenger.clone())
        };
        let payout = entry.claim.stake.saturating_add(challenge.stake);

        self.pay_out(claim_id, &beneficiary, payout).await?;
        entry.claim.advance(status)?;
        entry.challenge = None;

        let now = self.clock.now();
        info!(
            claim_id = %claim_id,
            status = status.as_str(),
            beneficiary = %beneficiary,
            payout,
            "claim resolved"
        );
        Self::record_transition(status);
        self.events.append(
            now,
            LedgerEventKind::ClaimResolved {
                claim_id,
                status,
                beneficiary: beneficiary.clone(),
                payout,
            },
        );
        let minted_score = if verified { self.mint(&entry.claim, now) } else { None };

        Ok(Settlement {
            claim_id,
            status,
            beneficiary,
            payout,
            minted_score,
        })
    }

    /// Accept an unchallenged claim once its deadline has passed
    pub async fn finalize(&self, claim_id: ClaimId) -> Result<Settlement, LedgerError> {
        let handle = self.entry(claim_id)?;
        self.ensure_not_paying(claim_id)?;
        let mut entry = handle.lock().await;
        let now = self.clock.now();

        if entry.claim.status != ClaimStatus::Pending {
            return Err(EconomicError::UnexpectedStatus {
                claim_id,
                expected: ClaimStatus::Pending,
                actual: entry.claim.status,
            }
            .into());
        }
        if entry.claim.window_open(now) {
            return Err(EconomicError::ChallengeWindowOpen {
                claim_id,
                deadline: entry.claim.challenge_deadline,
                now,
            }
            .into());
        }

        let owner = entry.claim.owner.clone();
        let payout = entry.claim.stake;
        self.pay_out(claim_id, &owner, payout).await?;
        entry.claim.advance(ClaimStatus::Verified)?;

        info!(claim_id = %claim_id, owner = %owner, payout, "claim finalized");
        Self::record_transition(ClaimStatus::Verified);
        self.events
            .append(now, LedgerEventKind::ClaimFinalized { claim_id, payout });
        let minted_score = self.mint(&entry.claim, now);

        Ok(Settlement {
            claim_id,
            status: ClaimStatus::Verified,
            beneficiary: owner,
            payout,
            minted_score,
        })
    }

    pub async fn claim(&self, claim_id: ClaimId) -> Option<Claim> {
        let handle = self.claims.get(&claim_id).map(|e| e.value().clone())?;
        let entry = handle.lock().await;
        Some(entry.claim.clone())
    }

    /// Open challenge against a claim, if any
    pub async fn challenge_of(&self, claim_id: ClaimId) -> Option<Challenge> {
        let handle = self.claims.get(&claim_id).map(|e| e.value().clone())?;
        let entry = handle.lock().await;
        entry.challenge.clone()
    }

    pub async fn claims_by_owner(&self, owner: &AccountId) -> Vec<Claim> {
        let handles: Vec<_> = self.claims.iter().map(|e| e.value().clone()).collect();
        let mut claims = Vec::new();
        for handle in handles {
            let entry = handle.lock().await;
            if &entry.claim.owner == owner {
                claims.push(entry.claim.clone());
            }
        }
        claims.sort_by_key(|c| c.id);
        claims
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn escrowed_total(&self) -> Amount {
        self.treasury.escrowed()
    }

    fn validate_submission(&self, submission: &ClaimSubmission, stake: Amount) -> Result<(), LedgerError> {
        if submission.min_balance == 0 {
            return Err(ValidationError::ZeroMinimumBalance.into());
        }
        let (start, end) = (submission.start_period, submission.end_period);
        if end <= start {
            return Err(ValidationError::InvalidPeriodRange { start, end }.into());
        }
        let current = self.clock.current_period();
        if end > current {
            return Err(ValidationError::FutureEndPeriod { end, current }.into());
        }
        check_density(start, end, &self.sampling)?;
        if stake < self.config.min_claim_stake {
            return Err(ValidationError::StakeTooLow {
                provided: stake,
                required: self.config.min_claim_stake,
            }
            .into());
        }
        Ok(())
    }

    fn entry(&self, claim_id: ClaimId) -> Result<Arc<Mutex<ClaimEntry>>, LedgerError> {
        self.claims
            .get(&claim_id)
            .map(|e| e.value().clone())
            .ok_or(LedgerError::ClaimNotFound(claim_id))
    }

    fn ensure_not_paying(&self, claim_id: ClaimId) -> Result<(), LedgerError> {
        if self.payouts_in_flight.contains(&claim_id) {
            warn!(claim_id = %claim_id, "rejecting call during payout");
            metrics::increment_counter!(names::REENTRANCY_REJECTIONS);
            return Err(LedgerError::Reentrant(claim_id));
        }
        Ok(())
    }

    async fn pay_out(&self, claim_id: ClaimId, to: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let _guard = PayoutGuard::acquire(&self.payouts_in_flight, claim_id)?;
        self.treasury.pay(to, amount).await.map_err(|e| {
            error!(claim_id = %claim_id, error = %e, "payout failed, status unchanged");
            e
        })?;
        metrics::increment_counter!(names::PAYOUTS);
        metrics::gauge!(names::ESCROWED_TOTAL, self.treasury.escrowed() as f64);
        Ok(())
    }

    /// Mint the claim's score; blacklisted owners keep their cut score
    fn mint(&self, claim: &Claim, now: Timestamp) -> Option<u16> {
        if self.reputation.is_blacklisted(&claim.owner) {
            warn!(claim_id = %claim.id, subject = %claim.owner, "owner is blacklisted, not minting");
            return None;
        }
        let score = reputation_score(
            claim.duration(),
            claim.min_balance,
            self.sampling.periods_per_year,
            &self.sampling.score,
        );
        self.reputation
            .mint(&claim.owner, score, claim.duration(), claim.id, now);
        debug!(claim_id = %claim.id, subject = %claim.owner, score, "reputation minted");
        metrics::increment_counter!(names::REPUTATION_MINTED);
        self.events.append(
            now,
            LedgerEventKind::ReputationMinted {
                claim_id: claim.id,
                subject: claim.owner.clone(),
                score,
            },
        );
        Some(score)
    }

    fn record_transition(status: ClaimStatus) {
        metrics::increment_counter!(names::CLAIM_TRANSITIONS, "status" => status.as_str());
    }
}
