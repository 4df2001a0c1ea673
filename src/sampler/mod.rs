/*!
# Temporal Sampler

Deterministic re-derivation of a balance-tenure claim.

Given a subject, a minimum balance and a period range, the sampler computes a
[`SampleSchedule`], queries the historical balance at every scheduled point,
and produces a commitment root over the observations together with a
candidate validity and reputation score.

## Sampling modes

- [`SamplingMode::FailFast`] stops at the first balance below the minimum.
  Used for the accept/dispute decision.
- [`SamplingMode::FullScan`] observes every point and reports all
  violations. Used to assemble dispute evidence.

Queries run in parallel, bounded by `max_concurrent_queries`; each one is
wrapped in a timeout and retried with exponential backoff. Results are
ordered by period before hashing, so completion order never affects the
commitment root.
*/

mod commitment;
mod config;
mod error;
mod history;
mod schedule;
mod score;

pub use commitment::{leaf_hash, CommitmentTree, InclusionProof};
pub use config::{
    SamplerConfig, ScoreConfig, DEFAULT_MIN_GAP, DEFAULT_PERIODS_PER_DAY, DEFAULT_SAMPLES_PER_YEAR,
};
pub use error::{DataSourceError, SamplerError};
pub use history::{BalanceHistory, InMemoryHistory};
pub use schedule::{actual_samples, check_density, required_samples, SampleSchedule};
pub use score::{balance_component, duration_component, reputation_score};

use futures::stream::{self, StreamExt};
use serde::{Serialize, Deserialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::metrics::{names, MetricsUtils};
use crate::network::{with_retry, ExponentialBackoff, RetryPolicy};
use crate::state::{AccountId, Amount, CommitmentRoot, Period};

/// How far a sampling run goes once a violation is seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMode {
    FailFast,
    FullScan,
}

/// One observed balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSample {
    pub period: Period,
    pub balance: Amount,
    pub meets_minimum: bool,
}

impl BalanceSample {
    pub fn new(period: Period, balance: Amount, min_balance: Amount) -> Self {
        Self {
            period,
            balance,
            meets_minimum: balance >= min_balance,
        }
    }
}

/// Inputs of a sampling run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingRequest {
    pub subject: AccountId,
    pub min_balance: Amount,
    pub start: Period,
    pub end: Period,
}

/// Result of a sampling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingReport {
    pub request: SamplingRequest,
    pub schedule: SampleSchedule,
    pub mode: SamplingMode,
    /// Observations, ascending by period
    pub samples: Vec<BalanceSample>,
    /// Periods whose balance fell below the minimum, ascending
    pub violations: Vec<Period>,
    pub valid: bool,
    /// Present only when every scheduled point was observed
    pub commitment_root: Option<CommitmentRoot>,
    /// Zero for an invalid claim
    pub score: u16,
}

impl SamplingReport {
    pub fn is_complete(&self) -> bool {
        self.samples.len() == self.schedule.points.len()
    }

    pub fn first_violation(&self) -> Option<Period> {
        self.violations.first().copied()
    }

    pub fn commitment_tree(&self) -> CommitmentTree {
        CommitmentTree::from_observations(self.samples.iter().map(|s| (s.period, s.balance)))
    }

    /// Inclusion proof for the observation at `period`, if it was sampled
    pub fn inclusion_proof(&self, period: Period) -> Option<InclusionProof> {
        let sample = self.samples.iter().find(|s| s.period == period)?;
        self.commitment_tree().proof(sample.period, sample.balance)
    }

    /// Whether the observed history reproduces `root`
    pub fn matches_root(&self, root: &CommitmentRoot) -> bool {
        self.commitment_root.as_ref() == Some(root)
    }
}

/// Temporal sampler over a historical balance service
pub struct TemporalSampler {
    config: SamplerConfig,
    history: Arc<dyn BalanceHistory>,
    retry: ExponentialBackoff,
}

impl TemporalSampler {
    pub fn new(config: SamplerConfig, history: Arc<dyn BalanceHistory>) -> Self {
        let retry = ExponentialBackoff::new(config.retry.clone());
        Self {
            config,
            history,
            retry,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &dyn RetryPolicy {
        &self.retry
    }

    pub fn schedule(&self, start: Period, end: Period) -> Result<SampleSchedule, SamplerError> {
        Ok(SampleSchedule::compute(start, end, &self.config)?)
    }

    /// Score for a valid claim of `duration_periods` at `balance`
    pub fn score(&self, duration_periods: u64, balance: Amount) -> u16 {
        reputation_score(
            duration_periods,
            balance,
            self.config.periods_per_year,
            &self.config.score,
        )
    }

    /// Sample the subject's history and evaluate the claim.
    ///
    /// A query that still fails after retries aborts the run with
    /// [`SamplerError::DataSource`]; partial results are not reported.
    pub async fn sample(
        &self,
        request: &SamplingRequest,
        mode: SamplingMode,
    ) -> Result<SamplingReport, SamplerError> {
        let started = Instant::now();
        let schedule = self.schedule(request.start, request.end)?;

        debug!(
            subject = %request.subject,
            start = request.start,
            end = request.end,
            points = schedule.points.len(),
            ?mode,
            "sampling balance history"
        );

        let subject = &request.subject;
        let mut queries = stream::iter(schedule.points.iter().copied())
            .map(|period| async move { (period, self.query(subject, period).await) })
            .buffer_unordered(self.config.max_concurrent_queries.max(1));

        let mut samples = Vec::with_capacity(schedule.points.len());
        let mut violations = Vec::new();
        while let Some((period, result)) = queries.next().await {
            let balance = result?;
            let sample = BalanceSample::new(period, balance, request.min_balance);
            if !sample.meets_minimum {
                violations.push(period);
                if mode == SamplingMode::FailFast {
                    samples.push(sample);
                    break;
                }
            }
            samples.push(sample);
        }
        drop(queries);

        samples.sort_by_key(|s| s.period);
        violations.sort_unstable();

        let complete = samples.len() == schedule.points.len();
        let valid = violations.is_empty() && complete;
        let commitment_root = complete.then(|| {
            CommitmentTree::from_observations(samples.iter().map(|s| (s.period, s.balance))).root()
        });
        let score = if valid {
            self.score(schedule.duration(), request.min_balance)
        } else {
            0
        };

        metrics::histogram!(
            names::SAMPLER_RUN_DURATION,
            MetricsUtils::duration_to_ms(started.elapsed())
        );
        info!(
            subject = %request.subject,
            valid,
            score,
            samples = samples.len(),
            violations = violations.len(),
            "sampling finished"
        );

        Ok(SamplingReport {
            request: request.clone(),
            schedule,
            mode,
            samples,
            violations,
            valid,
            commitment_root,
            score,
        })
    }

    async fn query(&self, subject: &AccountId, period: Period) -> Result<Amount, SamplerError> {
        let timeout = self.config.query_timeout;
        let result = with_retry(&self.retry, "balance_at", |_| async move {
            metrics::increment_counter!(names::SAMPLER_QUERIES);
            match tokio::time::timeout(timeout, self.history.balance_at(subject, period)).await {
                Ok(result) => result,
                Err(_) => Err(DataSourceError::Timeout { period, after: timeout }),
            }
        })
        .await;
        result.map_err(|source| SamplerError::DataSource { period, source })
    }
}
