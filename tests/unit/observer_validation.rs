use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use tenure_protocol::ledger::{Claim, ClaimSubmission};
use tenure_protocol::observer::{
    ChainObserver, ChallengeSubmitter, DisputeReason, LedgerEventSource, MemoryCheckpointStore,
    ObserverConfig, ObserverError, ProfitModel, ValidationOutcome,
};
use tenure_protocol::state::{Amount, ClaimId, CommitmentRoot};

use crate::common::{init_logging, observer_config, FixedVerifier, Harness, STAKE, UNIT};

#[derive(Default)]
struct RecordingSubmitter {
    submitted: Mutex<Vec<(ClaimId, Amount)>>,
}

#[async_trait]
impl ChallengeSubmitter for RecordingSubmitter {
    async fn submit_challenge(&self, claim_id: ClaimId, stake: Amount) -> Result<(), ObserverError> {
        self.submitted.lock().push((claim_id, stake));
        Ok(())
    }
}

fn observer(h: &Harness, config: ObserverConfig, submitter: Arc<RecordingSubmitter>) -> ChainObserver {
    ChainObserver::new(
        config,
        Arc::new(LedgerEventSource::new(h.ledger.events())),
        Arc::new(MemoryCheckpointStore::new()),
        h.sampler.clone(),
        submitter,
        h.clock.clone(),
    )
}

async fn submitted_claim(h: &Harness, submission: ClaimSubmission) -> Claim {
    let owner = crate::common::account("alice");
    let id = h.ledger.submit(owner, submission, STAKE).await.unwrap();
    h.ledger.claim(id).await.unwrap()
}

#[tokio::test]
async fn test_honest_claim_is_agreed() {
    init_logging();
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let submission = h.honest_submission(&alice, 5 * UNIT, 18_000_000, 20_500_000).await;
    let claim = submitted_claim(&h, submission).await;

    let submitter = Arc::new(RecordingSubmitter::default());
    let outcome = observer(&h, observer_config(), submitter.clone()).evaluate(&claim).await;

    assert_eq!(
        outcome,
        ValidationOutcome::Agreed {
            score: h.sampler.score(2_500_000, 5 * UNIT)
        }
    );
    assert!(submitter.submitted.lock().is_empty());
}

#[tokio::test]
async fn test_balance_dip_is_challenged() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    h.history.set_balance(&alice, 19_000_000, UNIT);
    h.history.set_balance(&alice, 19_200_000, 10 * UNIT);
    let claim = submitted_claim(
        &h,
        ClaimSubmission {
            min_balance: 5 * UNIT,
            start_period: 18_000_000,
            end_period: 20_500_000,
            commitment_root: CommitmentRoot::new([9; 32]),
        },
    )
    .await;

    let submitter = Arc::new(RecordingSubmitter::default());
    let outcome = observer(&h, observer_config(), submitter.clone()).evaluate(&claim).await;

    match outcome {
        ValidationOutcome::Disputed {
            reason: DisputeReason::BalanceBelowMinimum { period },
            expected_profit,
            challenged,
        } => {
            assert!((19_000_000..19_200_000).contains(&period));
            assert_eq!(expected_profit, (STAKE - 10) as i128);
            assert!(challenged);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(*submitter.submitted.lock(), vec![(claim.id, STAKE)]);
}

#[tokio::test]
async fn test_fabricated_root_is_a_mismatch() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let mut submission = h.honest_submission(&alice, 5 * UNIT, 18_000_000, 20_500_000).await;
    let honest_root = submission.commitment_root;
    submission.commitment_root = CommitmentRoot::new([7; 32]);
    let claim = submitted_claim(&h, submission).await;

    let submitter = Arc::new(RecordingSubmitter::default());
    let outcome = observer(&h, observer_config(), submitter.clone()).evaluate(&claim).await;

    assert!(matches!(
        outcome,
        ValidationOutcome::Disputed {
            reason: DisputeReason::RootMismatch { observed: Some(root) },
            challenged: true,
            ..
        } if root == honest_root
    ));
}

#[tokio::test]
async fn test_unprofitable_dispute_is_not_submitted() {
    let h = Harness::new(FixedVerifier::accepting());
    h.holder("alice", 0);
    let claim = submitted_claim(
        &h,
        ClaimSubmission {
            min_balance: 5 * UNIT,
            start_period: 18_000_000,
            end_period: 20_500_000,
            commitment_root: CommitmentRoot::new([9; 32]),
        },
    )
    .await;

    let config = ObserverConfig {
        profit: ProfitModel {
            challenge_stake: STAKE,
            estimated_gas_cost: 2 * STAKE,
            min_profit: 0,
        },
        ..observer_config()
    };
    let submitter = Arc::new(RecordingSubmitter::default());
    let outcome = observer(&h, config, submitter.clone()).evaluate(&claim).await;

    assert!(matches!(
        outcome,
        ValidationOutcome::Disputed { challenged: false, expected_profit, .. } if expected_profit < 0
    ));
    assert!(submitter.submitted.lock().is_empty());
}

#[tokio::test]
async fn test_history_outage_abandons_validation() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let submission = h.honest_submission(&alice, 5 * UNIT, 18_000_000, 20_500_000).await;
    let claim = submitted_claim(&h, submission).await;
    h.history.set_offline(true);

    let submitter = Arc::new(RecordingSubmitter::default());
    let observer = Arc::new(observer(&h, observer_config(), submitter.clone()));
    observer.start().await.unwrap();
    observer.drain_validations().await;

    assert!(matches!(
        observer.outcome(claim.id),
        Some(ValidationOutcome::Abandoned { .. })
    ));
    let stats = observer.stats();
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.validations, 1);
    assert!(submitter.submitted.lock().is_empty());

    // abandoned claims are not retried on restart
    h.history.set_offline(false);
    observer.start().await.unwrap();
    observer.drain_validations().await;
    assert_eq!(observer.stats().validations, 1);
}

#[tokio::test]
async fn test_replay_checkpoints_in_batches() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    for _ in 0..5 {
        let submission = h.honest_submission(&alice, 5 * UNIT, 18_000_000, 20_500_000).await;
        h.ledger.submit(alice.clone(), submission, STAKE).await.unwrap();
    }

    let submitter = Arc::new(RecordingSubmitter::default());
    let observer = Arc::new(observer(&h, observer_config(), submitter));
    let cursor = observer.start().await.unwrap();
    observer.drain_validations().await;

    assert_eq!(cursor, 5);
    let stats = observer.stats();
    // batches of two: 2 + 2 + 1
    assert_eq!(stats.batches_replayed, 3);
    // every second batch, then once at the end
    assert_eq!(stats.checkpoints_written, 2);
    assert_eq!(stats.agreed, 5);
    assert_eq!(observer.mirror().pending().len(), 5);
}
