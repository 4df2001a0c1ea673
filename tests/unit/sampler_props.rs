use proptest::prelude::*;
use std::collections::BTreeMap;
use tenure_protocol::sampler::{
    actual_samples, required_samples, reputation_score, BalanceHistory, CommitmentTree,
    InMemoryHistory, SampleSchedule, SamplerConfig, ScoreConfig,
};
use tenure_protocol::state::ValidationError;
use tenure_protocol::sync::ReplayGuard;

use crate::common::{account, chain, UNIT};

const PERIODS_PER_YEAR: u64 = 6_500 * 365;

#[test]
fn test_reference_range_needs_55_samples() {
    let config = SamplerConfig::default();
    assert_eq!(required_samples(2_500_000, 52, PERIODS_PER_YEAR), 55);

    let schedule = SampleSchedule::compute(18_000_000, 20_500_000, &config).unwrap();
    assert_eq!(schedule.sample_count, 55);
    assert_eq!(schedule.points.first(), Some(&18_000_000));
    assert_eq!(schedule.points.last(), Some(&20_500_000));
}

#[test]
fn test_too_short_range_is_rejected() {
    let config = SamplerConfig::default();
    assert_eq!(
        SampleSchedule::compute(1_000, 1_050, &config).unwrap_err(),
        ValidationError::InsufficientSampleGap { gap: 50, min_gap: 100 }
    );
}

#[test]
fn test_reference_score() {
    let score = reputation_score(2_500_000, 10 * UNIT, PERIODS_PER_YEAR, &ScoreConfig::default());
    assert!((420..=450).contains(&score), "score {score}");
}

proptest! {
    #[test]
    fn test_schedule_points_are_spaced_and_end_at_end(
        start in 0u64..50_000_000u64,
        duration in 100u64..20_000_000u64,
    ) {
        let config = SamplerConfig::default();
        let end = start + duration;
        let schedule = SampleSchedule::compute(start, end, &config).unwrap();

        prop_assert_eq!(schedule.points[0], start);
        prop_assert_eq!(*schedule.points.last().unwrap(), end);
        prop_assert!(schedule.gap >= config.min_gap);
        prop_assert!(schedule.sample_count <= schedule.required_samples);
        prop_assert!(schedule.points.len() as u64 <= schedule.sample_count + 1);
        for pair in schedule.points.windows(2) {
            prop_assert!(pair[1] - pair[0] >= schedule.gap);
        }
    }

    #[test]
    fn test_smaller_min_gap_never_takes_fewer_samples(
        duration in 1u64..100_000_000u64,
        samples_per_year in 1u64..10_000u64,
        small in 1u64..1_000u64,
        extra in 0u64..1_000u64,
    ) {
        let required = required_samples(duration, samples_per_year, PERIODS_PER_YEAR);
        let loose = actual_samples(duration, required, small);
        let strict = actual_samples(duration, required, small + extra);
        prop_assert!(loose >= strict);
        prop_assert!(loose <= required);
    }

    #[test]
    fn test_score_is_bounded_and_monotone(
        duration in 0u64..50_000_000u64,
        more_duration in 0u64..10_000_000u64,
        balance in 0u128..1_000_000_000_000_000_000_000_000u128,
        more_balance in 0u128..1_000_000_000_000_000_000_000u128,
    ) {
        let config = ScoreConfig::default();
        let base = reputation_score(duration, balance, PERIODS_PER_YEAR, &config);
        let longer = reputation_score(duration + more_duration, balance, PERIODS_PER_YEAR, &config);
        let richer = reputation_score(duration, balance + more_balance, PERIODS_PER_YEAR, &config);

        prop_assert!(base <= config.max_score);
        prop_assert!(longer >= base);
        prop_assert!(richer >= base);
    }

    #[test]
    fn test_root_ignores_observation_order(
        observations in prop::collection::btree_map(any::<u64>(), any::<u128>(), 1..64),
    ) {
        let forward: Vec<_> = observations.iter().map(|(p, b)| (*p, *b)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        let tree = CommitmentTree::from_observations(forward.iter().copied());
        let root = tree.root();
        prop_assert_eq!(root, CommitmentTree::from_observations(backward).root());
        prop_assert_eq!(tree.len(), observations.len());

        for (period, balance) in &forward {
            let proof = tree.proof(*period, *balance).unwrap();
            prop_assert!(proof.verify(&root));
        }
    }

    #[test]
    fn test_replay_guard_accepts_strictly_increasing(
        sequences in prop::collection::vec(0u64..50, 1..40),
    ) {
        let guard = ReplayGuard::new();
        let source = chain("remote");
        let mut accepted = Vec::new();
        for sequence in &sequences {
            if guard.accept(&source, *sequence).is_ok() {
                accepted.push(*sequence);
            }
        }

        prop_assert!(accepted.windows(2).all(|w| w[0] < w[1]));
        let max = sequences.iter().max().copied();
        prop_assert_eq!(guard.high_water(&source), max);
        prop_assert_eq!(accepted.last().copied(), max);
    }
}

#[test]
fn test_tampered_balance_breaks_proof() {
    let observations: BTreeMap<u64, u128> = (0..9).map(|i| (i * 1_000, 5 * UNIT)).collect();
    let tree = CommitmentTree::from_observations(observations.clone());
    let root = tree.root();

    let mut proof = tree.proof(3_000, 5 * UNIT).unwrap();
    proof.balance = 4 * UNIT;
    assert!(!proof.verify(&root));
    assert!(tree.proof(3_000, 4 * UNIT).is_none());
}

#[test]
fn test_history_is_a_step_function() {
    let history = InMemoryHistory::new();
    let alice = account("alice");
    history.set_balance(&alice, 100, 7 * UNIT);
    history.set_balance(&alice, 200, UNIT);

    tokio_test::block_on(async {
        assert_eq!(tokio_test::assert_ok!(history.balance_at(&alice, 99).await), 0);
        assert_eq!(tokio_test::assert_ok!(history.balance_at(&alice, 100).await), 7 * UNIT);
        assert_eq!(tokio_test::assert_ok!(history.balance_at(&alice, 199).await), 7 * UNIT);
        assert_eq!(tokio_test::assert_ok!(history.balance_at(&alice, 5_000).await), UNIT);

        history.set_offline(true);
        tokio_test::assert_err!(history.balance_at(&alice, 150).await);
    });
    assert_eq!(history.query_count(), 5);
}
