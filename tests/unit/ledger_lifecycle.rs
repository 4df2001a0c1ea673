use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tenure_protocol::ledger::{
    ClaimLedger, ClaimStatus, ClaimSubmission, InMemoryTreasury, LedgerError, LedgerEventKind,
    ManualClock, ProofVerifier, PublicInputs, Treasury, TreasuryError, VerifierError,
};
use tenure_protocol::observer::ClaimMirror;
use tenure_protocol::state::{AccountId, Amount, ClaimId, CommitmentRoot, EconomicError, ValidationError};

use crate::common::{
    account, ledger_config, sampler_config, FixedVerifier, Harness, CHALLENGE_WINDOW,
    CURRENT_PERIOD, STAKE, START_TIME, UNIT,
};

mock! {
    pub Verifier {}

    #[async_trait]
    impl ProofVerifier for Verifier {
        async fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, VerifierError>;
    }
}

fn submission(root: [u8; 32]) -> ClaimSubmission {
    ClaimSubmission {
        min_balance: 5 * UNIT,
        start_period: 18_000_000,
        end_period: 20_500_000,
        commitment_root: CommitmentRoot::new(root),
    }
}

#[tokio::test]
async fn test_submission_is_validated_before_stake_is_taken() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let funds = h.treasury.balance_of(&alice);

    let mut zero = submission([1; 32]);
    zero.min_balance = 0;
    let mut inverted = submission([1; 32]);
    inverted.end_period = inverted.start_period;
    let mut future = submission([1; 32]);
    future.end_period = CURRENT_PERIOD + 1;
    let mut dense = submission([1; 32]);
    dense.start_period = 20_000_000;
    dense.end_period = 20_000_050;

    let cases = vec![
        (zero, STAKE, LedgerError::Validation(ValidationError::ZeroMinimumBalance)),
        (
            inverted,
            STAKE,
            LedgerError::Validation(ValidationError::InvalidPeriodRange {
                start: 18_000_000,
                end: 18_000_000,
            }),
        ),
        (
            future,
            STAKE,
            LedgerError::Validation(ValidationError::FutureEndPeriod {
                end: CURRENT_PERIOD + 1,
                current: CURRENT_PERIOD,
            }),
        ),
        (
            dense,
            STAKE,
            LedgerError::Validation(ValidationError::InsufficientSampleGap { gap: 50, min_gap: 100 }),
        ),
        (
            submission([1; 32]),
            10,
            LedgerError::Validation(ValidationError::StakeTooLow { provided: 10, required: 100 }),
        ),
    ];

    for (submission, stake, expected) in cases {
        let err = h.ledger.submit(alice.clone(), submission, stake).await.unwrap_err();
        assert_eq!(err, expected);
    }
    assert_eq!(h.ledger.claim_count(), 0);
    assert_eq!(h.treasury.balance_of(&alice), funds);
    assert_eq!(h.ledger.events().head(), 0);
}

#[tokio::test]
async fn test_unfunded_owner_cannot_submit() {
    let h = Harness::new(FixedVerifier::accepting());
    let err = h
        .ledger
        .submit(account("pauper"), submission([1; 32]), STAKE)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Treasury(TreasuryError::InsufficientFunds { .. })));
    assert_eq!(h.ledger.claim_count(), 0);
}

#[tokio::test]
async fn test_challenge_window_includes_the_deadline() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 10 * UNIT);
    let carol = h.holder("carol", 0);

    let first = h.ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
    let second = h.ledger.submit(bob.clone(), submission([2; 32]), STAKE).await.unwrap();
    let deadline = START_TIME + CHALLENGE_WINDOW;
    assert_eq!(h.ledger.claim(first).await.unwrap().challenge_deadline, deadline);

    h.clock.set_time(deadline);
    h.ledger.challenge(first, carol.clone(), STAKE).await.unwrap();
    assert_eq!(h.ledger.claim(first).await.unwrap().status, ClaimStatus::Challenged);

    h.clock.set_time(deadline + 1);
    let before = h.treasury.balance_of(&carol);
    let err = h.ledger.challenge(second, carol.clone(), STAKE).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::Economic(EconomicError::ChallengeWindowClosed {
            claim_id: second,
            deadline,
            now: deadline + 1,
        })
    );
    assert_eq!(h.treasury.balance_of(&carol), before);
    assert_eq!(h.ledger.claim(second).await.unwrap().status, ClaimStatus::Pending);
}

#[tokio::test]
async fn test_owner_cannot_challenge_own_claim() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let id = h.ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();

    let err = h.ledger.challenge(id, alice, STAKE).await.unwrap_err();
    assert_eq!(err, LedgerError::Economic(EconomicError::SelfChallenge { claim_id: id }));
    assert!(h.ledger.challenge_of(id).await.is_none());
}

#[tokio::test]
async fn test_challenge_twice_and_unknown_claim() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 0);
    let carol = h.holder("carol", 0);
    let id = h.ledger.submit(alice, submission([1; 32]), STAKE).await.unwrap();

    h.ledger.challenge(id, bob.clone(), STAKE).await.unwrap();
    let err = h.ledger.challenge(id, carol, STAKE).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Economic(EconomicError::UnexpectedStatus {
            actual: ClaimStatus::Challenged,
            ..
        })
    ));
    assert_eq!(h.ledger.challenge_of(id).await.unwrap().challenger, bob);

    let missing = ClaimId::new(99);
    assert_eq!(
        h.ledger.challenge(missing, account("bob"), STAKE).await.unwrap_err(),
        LedgerError::ClaimNotFound(missing)
    );
}

#[tokio::test]
async fn test_verified_resolution_pays_owner_both_stakes() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 0);
    let id = h.ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
    h.ledger.challenge(id, bob.clone(), 2 * STAKE).await.unwrap();
    assert_eq!(h.ledger.escrowed_total(), 3 * STAKE);

    let settlement = h.ledger.resolve(id, b"proof").await.unwrap();
    assert_eq!(settlement.status, ClaimStatus::Verified);
    assert_eq!(settlement.beneficiary, alice);
    assert_eq!(settlement.payout, 3 * STAKE);
    assert_eq!(h.treasury.balance_of(&alice), 10 * STAKE - STAKE + 3 * STAKE);
    assert_eq!(h.treasury.balance_of(&bob), 10 * STAKE - 2 * STAKE);
    assert_eq!(h.ledger.escrowed_total(), 0);

    let score = settlement.minted_score.unwrap();
    assert_eq!(score, h.sampler.score(2_500_000, 5 * UNIT));
    assert_eq!(h.ledger.reputation().effective_score(&alice), score);
    assert!(h.ledger.challenge_of(id).await.is_none());
}

#[tokio::test]
async fn test_rejected_resolution_pays_challenger_and_mints_nothing() {
    let h = Harness::new(FixedVerifier::rejecting());
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 0);
    let id = h.ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
    h.ledger.challenge(id, bob.clone(), STAKE).await.unwrap();

    let settlement = h.ledger.resolve(id, b"proof").await.unwrap();
    assert_eq!(settlement.status, ClaimStatus::Rejected);
    assert_eq!(settlement.beneficiary, bob);
    assert_eq!(settlement.minted_score, None);
    assert_eq!(h.treasury.balance_of(&bob), 10 * STAKE + STAKE);
    assert!(h.ledger.reputation().record(&alice).is_none());

    let kinds: Vec<&str> = h
        .ledger
        .events()
        .fetch(0, 10)
        .iter()
        .map(|e| e.kind.name())
        .collect();
    assert_eq!(kinds, vec!["claim_submitted", "claim_challenged", "claim_resolved"]);
}

#[tokio::test]
async fn test_unavailable_verifier_leaves_claim_challenged() {
    let verifier = FixedVerifier::unavailable();
    let h = Harness::new(verifier.clone());
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 0);
    let id = h.ledger.submit(alice, submission([1; 32]), STAKE).await.unwrap();
    h.ledger.challenge(id, bob, STAKE).await.unwrap();

    let err = h.ledger.resolve(id, b"proof").await.unwrap_err();
    assert!(matches!(err, LedgerError::VerifierUnavailable { claim_id, .. } if claim_id == id));
    assert!(err.is_retryable());
    assert_eq!(verifier.calls(), 1);
    assert_eq!(h.ledger.claim(id).await.unwrap().status, ClaimStatus::Challenged);
    assert_eq!(h.ledger.escrowed_total(), 2 * STAKE);
}

#[tokio::test]
async fn test_verifier_receives_claim_public_inputs() {
    let root = [4u8; 32];
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify()
        .withf(move |proof, inputs| {
            proof == b"zk-proof".as_slice()
                && inputs.commitment_root == root
                && inputs.min_balance == 5 * UNIT
                && inputs.start_period == 18_000_000
                && inputs.end_period == 20_500_000
        })
        .times(1)
        .returning(|_, _| Ok(true));

    let h = Harness::new(Arc::new(verifier));
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 0);
    let id = h.ledger.submit(alice, submission(root), STAKE).await.unwrap();
    h.ledger.challenge(id, bob, STAKE).await.unwrap();

    let settlement = h.ledger.resolve(id, b"zk-proof").await.unwrap();
    assert_eq!(settlement.status, ClaimStatus::Verified);
}

#[tokio::test]
async fn test_resolve_requires_a_challenge() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let id = h.ledger.submit(alice, submission([1; 32]), STAKE).await.unwrap();

    let err = h.ledger.resolve(id, b"proof").await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Economic(EconomicError::UnexpectedStatus {
            expected: ClaimStatus::Challenged,
            actual: ClaimStatus::Pending,
            ..
        })
    ));
}

#[tokio::test]
async fn test_claims_by_owner_are_sorted() {
    let h = Harness::new(FixedVerifier::accepting());
    let alice = h.holder("alice", 10 * UNIT);
    let bob = h.holder("bob", 10 * UNIT);
    let a1 = h.ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
    h.ledger.submit(bob, submission([2; 32]), STAKE).await.unwrap();
    let a2 = h.ledger.submit(alice.clone(), submission([3; 32]), STAKE).await.unwrap();

    let ids: Vec<ClaimId> = h.ledger.claims_by_owner(&alice).await.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![a1, a2]);
    assert_eq!(h.ledger.claim_count(), 3);
}

/// Treasury whose payouts can be switched off
struct FlakyTreasury {
    inner: InMemoryTreasury,
    paying: AtomicBool,
}

#[async_trait]
impl Treasury for FlakyTreasury {
    async fn collect(&self, from: &AccountId, amount: Amount) -> Result<(), TreasuryError> {
        self.inner.collect(from, amount).await
    }

    async fn pay(&self, to: &AccountId, amount: Amount) -> Result<(), TreasuryError> {
        if !self.paying.load(Ordering::SeqCst) {
            return Err(TreasuryError::Unavailable("payout rail down".into()));
        }
        self.inner.pay(to, amount).await
    }

    fn escrowed(&self) -> Amount {
        self.inner.escrowed()
    }
}

#[tokio::test]
async fn test_failed_payout_leaves_status_unchanged() {
    let clock = Arc::new(ManualClock::new(START_TIME, CURRENT_PERIOD));
    let treasury = Arc::new(FlakyTreasury {
        inner: InMemoryTreasury::new(),
        paying: AtomicBool::new(false),
    });
    let alice = account("alice");
    treasury.inner.fund(&alice, STAKE);
    let ledger = ClaimLedger::new(
        ledger_config(),
        sampler_config(),
        FixedVerifier::accepting(),
        treasury.clone(),
        clock.clone(),
    );

    let id = ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
    clock.advance(CHALLENGE_WINDOW + 1);

    let err = ledger.finalize(id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Treasury(TreasuryError::Unavailable(_))));
    assert!(err.is_retryable());
    assert_eq!(ledger.claim(id).await.unwrap().status, ClaimStatus::Pending);
    assert_eq!(ledger.escrowed_total(), STAKE);
    assert!(ledger.reputation().record(&alice).is_none());

    treasury.paying.store(true, Ordering::SeqCst);
    let settlement = ledger.finalize(id).await.unwrap();
    assert_eq!(settlement.status, ClaimStatus::Verified);
    assert_eq!(treasury.inner.balance_of(&alice), STAKE);
}

/// Treasury that calls back into the ledger while paying out
struct ReentrantTreasury {
    inner: InMemoryTreasury,
    ledger: Mutex<Option<Arc<ClaimLedger>>>,
    target: Mutex<Option<ClaimId>>,
    observed: Mutex<Vec<LedgerError>>,
}

#[async_trait]
impl Treasury for ReentrantTreasury {
    async fn collect(&self, from: &AccountId, amount: Amount) -> Result<(), TreasuryError> {
        self.inner.collect(from, amount).await
    }

    async fn pay(&self, to: &AccountId, amount: Amount) -> Result<(), TreasuryError> {
        let ledger = self.ledger.lock().clone();
        let target = *self.target.lock();
        if let (Some(ledger), Some(claim_id)) = (ledger, target) {
            if let Err(e) = ledger.finalize(claim_id).await {
                self.observed.lock().push(e);
            }
            if let Err(e) = ledger.challenge(claim_id, AccountId::new("mallory"), STAKE).await {
                self.observed.lock().push(e);
            }
        }
        self.inner.pay(to, amount).await
    }

    fn escrowed(&self) -> Amount {
        self.inner.escrowed()
    }
}

#[tokio::test]
async fn test_calls_during_payout_are_rejected() {
    let clock = Arc::new(ManualClock::new(START_TIME, CURRENT_PERIOD));
    let treasury = Arc::new(ReentrantTreasury {
        inner: InMemoryTreasury::new(),
        ledger: Mutex::new(None),
        target: Mutex::new(None),
        observed: Mutex::new(Vec::new()),
    });
    let alice = account("alice");
    treasury.inner.fund(&alice, STAKE);
    treasury.inner.fund(&account("mallory"), STAKE);
    let ledger = Arc::new(ClaimLedger::new(
        ledger_config(),
        sampler_config(),
        FixedVerifier::accepting(),
        treasury.clone(),
        clock.clone(),
    ));
    *treasury.ledger.lock() = Some(ledger.clone());

    let id = ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
    *treasury.target.lock() = Some(id);
    clock.advance(CHALLENGE_WINDOW + 1);

    let settlement = ledger.finalize(id).await.unwrap();
    assert_eq!(settlement.payout, STAKE);
    assert_eq!(
        *treasury.observed.lock(),
        vec![LedgerError::Reentrant(id), LedgerError::Reentrant(id)]
    );
    assert_eq!(treasury.inner.balance_of(&alice), STAKE);
    assert_eq!(ledger.escrowed_total(), 0);

    let finalized = ledger
        .events()
        .fetch(0, 10)
        .iter()
        .filter(|e| matches!(e.kind, LedgerEventKind::ClaimFinalized { .. }))
        .count();
    assert_eq!(finalized, 1);

    // break the cycle
    treasury.ledger.lock().take();
}

fn count_events(ledger: &ClaimLedger, matches: impl Fn(&LedgerEventKind) -> bool) -> usize {
    ledger
        .events()
        .fetch(0, 100)
        .iter()
        .filter(|e| matches(&e.kind))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_challenges_escrow_one_stake() {
    for _ in 0..20 {
        let h = Harness::new(FixedVerifier::rejecting());
        let alice = h.holder("alice", 10 * UNIT);
        let bob = h.holder("bob", 0);
        let carol = h.holder("carol", 0);
        let id = h.ledger.submit(alice, submission([1; 32]), STAKE).await.unwrap();

        let racers: Vec<_> = [bob.clone(), carol.clone()]
            .into_iter()
            .map(|challenger| {
                let ledger = h.ledger.clone();
                tokio::spawn(async move { ledger.challenge(id, challenger, STAKE).await })
            })
            .collect();
        let mut results = Vec::new();
        for racer in racers {
            results.push(racer.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(h.ledger.escrowed_total(), 2 * STAKE);
        assert_eq!(
            h.treasury.balance_of(&bob) + h.treasury.balance_of(&carol),
            2 * 10 * STAKE - STAKE
        );
        let winner = h.ledger.challenge_of(id).await.unwrap().challenger;
        assert_eq!(h.treasury.balance_of(&winner), 10 * STAKE - STAKE);
        assert_eq!(count_events(&h.ledger, |k| matches!(k, LedgerEventKind::ClaimChallenged { .. })), 1);

        // two settlements of the same challenge: one payout
        let racers: Vec<_> = (0..2)
            .map(|_| {
                let ledger = h.ledger.clone();
                tokio::spawn(async move { ledger.resolve(id, b"proof").await })
            })
            .collect();
        let mut settled = 0;
        for racer in racers {
            if racer.await.unwrap().is_ok() {
                settled += 1;
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(h.ledger.escrowed_total(), 0);
        assert_eq!(h.treasury.balance_of(&winner), 10 * STAKE + STAKE);
        assert_eq!(count_events(&h.ledger, |k| matches!(k, LedgerEventKind::ClaimResolved { .. })), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_finalizations_pay_once() {
    for _ in 0..20 {
        let h = Harness::new(FixedVerifier::accepting());
        let alice = h.holder("alice", 10 * UNIT);
        let id = h.ledger.submit(alice.clone(), submission([1; 32]), STAKE).await.unwrap();
        h.clock.advance(CHALLENGE_WINDOW + 1);

        let racers: Vec<_> = (0..3)
            .map(|_| {
                let ledger = h.ledger.clone();
                tokio::spawn(async move { ledger.finalize(id).await })
            })
            .collect();
        let mut settled = 0;
        for racer in racers {
            match racer.await.unwrap() {
                Ok(_) => settled += 1,
                Err(e) => assert!(matches!(
                    e,
                    LedgerError::Reentrant(_) | LedgerError::Economic(EconomicError::UnexpectedStatus { .. })
                )),
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(h.ledger.escrowed_total(), 0);
        assert_eq!(h.treasury.balance_of(&alice), 10 * STAKE);
        assert_eq!(count_events(&h.ledger, |k| matches!(k, LedgerEventKind::ClaimFinalized { .. })), 1);
        assert_eq!(count_events(&h.ledger, |k| matches!(k, LedgerEventKind::ReputationMinted { .. })), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submission_event_precedes_an_immediate_challenge() {
    for _ in 0..20 {
        let h = Harness::new(FixedVerifier::accepting());
        let alice = h.holder("alice", 10 * UNIT);
        let bob = h.holder("bob", 0);

        let challenger = {
            let ledger = h.ledger.clone();
            tokio::spawn(async move {
                loop {
                    match ledger.challenge(ClaimId::new(1), bob.clone(), STAKE).await {
                        Err(LedgerError::ClaimNotFound(_)) => tokio::task::yield_now().await,
                        other => break other,
                    }
                }
            })
        };
        let id = h.ledger.submit(alice, submission([1; 32]), STAKE).await.unwrap();
        let challenged = tokio::time::timeout(std::time::Duration::from_secs(5), challenger)
            .await
            .unwrap()
            .unwrap();
        assert!(challenged.is_ok());

        let mirror = ClaimMirror::new();
        for event in h.ledger.events().fetch(0, 10) {
            mirror.apply(&event);
        }
        assert_eq!(mirror.get(id).map(|c| c.status), Some(ClaimStatus::Challenged));
    }
}
