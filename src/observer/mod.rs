/*!
# Chain Observer

Durable consumer of the ledger event stream that independently re-derives
every new claim and disputes the ones it disagrees with, when doing so pays.

## Startup

1. Load the checkpoint from the injected [`CheckpointStore`]. A missing
   checkpoint starts from genesis; a corrupted one is discarded and the
   observer resyncs from genesis.
2. Replay historical events in batches of `batch_size`, writing a
   checkpoint every `checkpoint_every_batches` batches and once at the end.
3. Validate every claim that is still pending after the replay.

## Live operation

The observer subscribes to the live feed and applies events in position
order. A gap, a lagging receiver or an idle feed falls back to fetching from
the source; a closed feed is re-subscribed with exponential backoff. The loop
never stops on source errors, only on the shutdown signal.

## Validation

Each pending claim is sampled with [`SamplingMode::FailFast`]. The observer
disagrees when a sampled balance is below the minimum or when its own
commitment root differs from the claimed one. A dispute is submitted only if
`potential_reward - challenge_stake - estimated_gas_cost` exceeds the
configured floor. Validations of distinct claims run concurrently; a
data-source failure abandons only that validation.
*/

mod checkpoint;
mod config;
mod error;
mod mirror;
mod profit;
mod source;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::ObserverConfig;
pub use error::{CheckpointError, ObserverError};
pub use mirror::{ApplyOutcome, ClaimMirror};
pub use profit::ProfitModel;
pub use source::{ChallengeSubmitter, EventSource, LedgerChallenger, LedgerEventSource};

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ledger::{Claim, ClaimStatus, Clock, LedgerEvent, LedgerEventKind};
use crate::metrics::{names, MetricsUtils};
use crate::network::{with_retry, ExponentialBackoff, RetryPolicy};
use crate::sampler::{SamplingMode, SamplingRequest, TemporalSampler};
use crate::state::{ClaimId, CommitmentRoot, Period};

/// Why the observer disagrees with a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeReason {
    BalanceBelowMinimum { period: Period },
    RootMismatch { observed: Option<CommitmentRoot> },
}

/// Result of validating one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Agreed {
        score: u16,
    },
    Disputed {
        reason: DisputeReason,
        expected_profit: i128,
        challenged: bool,
    },
    Abandoned {
        reason: String,
    },
}

impl ValidationOutcome {
    fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Agreed { .. } => "agreed",
            ValidationOutcome::Disputed { .. } => "disputed",
            ValidationOutcome::Abandoned { .. } => "abandoned",
        }
    }
}

/// Observer statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserverStats {
    pub cursor: u64,
    pub events_applied: u64,
    pub batches_replayed: u64,
    pub checkpoints_written: u64,
    pub resyncs: u64,
    pub reconnects: u64,
    pub validations: u64,
    pub agreed: u64,
    pub disputed: u64,
    pub challenges_submitted: u64,
    pub abandoned: u64,
    pub average_validation_ms: f64,
}

/// Ledger event consumer and dispute agent
pub struct ChainObserver {
    id: Uuid,
    config: ObserverConfig,
    source: Arc<dyn EventSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    sampler: Arc<TemporalSampler>,
    submitter: Arc<dyn ChallengeSubmitter>,
    clock: Arc<dyn Clock>,
    mirror: ClaimMirror,
    outcomes: DashMap<ClaimId, ValidationOutcome>,
    in_flight: DashSet<ClaimId>,
    permits: Arc<Semaphore>,
    /// Scheduled validations not yet recorded
    active: watch::Sender<usize>,
    source_retry: ExponentialBackoff,
    reconnect: ExponentialBackoff,
    events_since_checkpoint: AtomicU64,
    stats: RwLock<ObserverStats>,
}

impl ChainObserver {
    pub fn new(
        config: ObserverConfig,
        source: Arc<dyn EventSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        sampler: Arc<TemporalSampler>,
        submitter: Arc<dyn ChallengeSubmitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_validations.max(1)));
        let (active, _) = watch::channel(0usize);
        let source_retry = ExponentialBackoff::new(config.source_retry.clone());
        let reconnect = ExponentialBackoff::new(config.reconnect.clone());
        Self {
            id: Uuid::new_v4(),
            config,
            source,
            checkpoints,
            sampler,
            submitter,
            clock,
            mirror: ClaimMirror::new(),
            outcomes: DashMap::new(),
            in_flight: DashSet::new(),
            permits,
            active,
            source_retry,
            reconnect,
            events_since_checkpoint: AtomicU64::new(0),
            stats: RwLock::new(ObserverStats::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cursor(&self) -> u64 {
        self.mirror.next_position()
    }

    pub fn mirror(&self) -> &ClaimMirror {
        &self.mirror
    }

    pub fn stats(&self) -> ObserverStats {
        self.stats.read().clone()
    }

    pub fn outcome(&self, claim_id: ClaimId) -> Option<ValidationOutcome> {
        self.outcomes.get(&claim_id).map(|o| o.clone())
    }

    pub fn outcomes(&self) -> Vec<(ClaimId, ValidationOutcome)> {
        let mut outcomes: Vec<_> = self
            .outcomes
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        outcomes.sort_by_key(|(id, _)| *id);
        outcomes
    }

    /// Load the checkpoint, replay history and validate open claims
    pub async fn start(self: &Arc<Self>) -> Result<u64, ObserverError> {
        match self.checkpoints.load().await {
            Ok(Some(checkpoint)) => {
                info!(
                    observer_id = %self.id,
                    cursor = checkpoint.cursor,
                    open_claims = checkpoint.open_claims.len(),
                    "resuming from checkpoint"
                );
                self.mirror.reset_to(checkpoint.cursor, checkpoint.open_claims);
            }
            Ok(None) => {
                info!(observer_id = %self.id, "no checkpoint, replaying from genesis");
                self.mirror.reset_to(0, Vec::new());
            }
            Err(CheckpointError::Corrupted(reason)) => {
                error!(observer_id = %self.id, %reason, "checkpoint corrupted, resyncing from genesis");
                self.mirror.reset_to(0, Vec::new());
                self.stats.write().resyncs += 1;
            }
            Err(e) => return Err(e.into()),
        }

        let cursor = self.replay().await?;
        self.schedule_pending();
        Ok(cursor)
    }

    /// Replay historical events from the current cursor to the head of the source
    pub async fn replay(self: &Arc<Self>) -> Result<u64, ObserverError> {
        let every = self.config.checkpoint_every_batches.max(1);
        let mut batches = 0u64;

        loop {
            let from = self.mirror.next_position();
            let events = self.fetch_batch(from).await?;
            let fetched = events.len();
            if fetched == 0 {
                break;
            }
            self.apply_events(&events, false).await;
            batches += 1;
            self.stats.write().batches_replayed += 1;
            debug!(observer_id = %self.id, from, fetched, "replayed batch");

            if batches % every == 0 {
                self.checkpoint().await?;
            }
            if fetched < self.config.batch_size || self.mirror.next_position() == from {
                break;
            }
        }

        self.checkpoint().await?;
        info!(observer_id = %self.id, cursor = self.cursor(), batches, "replay finished");
        Ok(self.cursor())
    }

    /// Consume the live feed until `shutdown` turns true or its sender is dropped
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), ObserverError> {
        info!(observer_id = %self.id, "chain observer starting");
        self.start().await?;

        let mut attempt: u32 = 0;
        'outer: loop {
            if *shutdown.borrow() {
                break;
            }

            let mut live = match self.source.subscribe().await {
                Ok(live) => {
                    attempt = 0;
                    live
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    let delay = self.reconnect.delay(attempt);
                    warn!(observer_id = %self.id, error = %e, attempt, ?delay, "subscription failed");
                    self.note_reconnect();
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
            };

            // events appended between replay and subscription
            self.catch_up_logged().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break 'outer;
                        }
                    }
                    received = tokio::time::timeout(self.config.idle_timeout, live.recv()) => {
                        match received {
                            Ok(Ok(event)) => self.on_live_event(event).await,
                            Ok(Err(RecvError::Lagged(skipped))) => {
                                warn!(observer_id = %self.id, skipped, "live feed lagged, catching up");
                                self.catch_up_logged().await;
                            }
                            Ok(Err(RecvError::Closed)) => {
                                warn!(observer_id = %self.id, "live feed closed, reconnecting");
                                self.note_reconnect();
                                break;
                            }
                            Err(_) => {
                                debug!(observer_id = %self.id, "live feed idle, polling source");
                                self.catch_up_logged().await;
                            }
                        }
                    }
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = self.reconnect.delay(attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.checkpoint().await?;
        info!(observer_id = %self.id, cursor = self.cursor(), "chain observer stopped");
        Ok(())
    }

    /// Wait until every scheduled validation has finished
    pub async fn drain_validations(&self) {
        let mut active = self.active.subscribe();
        let _ = active.wait_for(|n| *n == 0).await;
    }

    /// Validations scheduled or running
    pub fn active_validations(&self) -> usize {
        *self.active.borrow()
    }

    /// Persist the cursor and the open claims
    pub async fn checkpoint(&self) -> Result<(), ObserverError> {
        let checkpoint = Checkpoint {
            cursor: self.mirror.next_position(),
            open_claims: self.mirror.snapshot(),
        };
        self.checkpoints.store(&checkpoint).await?;
        self.events_since_checkpoint.store(0, Ordering::SeqCst);
        self.stats.write().checkpoints_written += 1;
        metrics::increment_counter!(names::OBSERVER_CHECKPOINTS);
        debug!(observer_id = %self.id, cursor = checkpoint.cursor, "checkpoint stored");
        Ok(())
    }

    /// Re-derive a claim and dispute it if that is profitable
    pub async fn evaluate(&self, claim: &Claim) -> ValidationOutcome {
        let request = SamplingRequest {
            subject: claim.owner.clone(),
            min_balance: claim.min_balance,
            start: claim.start_period,
            end: claim.end_period,
        };

        let report = match self.sampler.sample(&request, SamplingMode::FailFast).await {
            Ok(report) => report,
            Err(e) => {
                warn!(claim_id = %claim.id, error = %e, "validation abandoned");
                return ValidationOutcome::Abandoned { reason: e.to_string() };
            }
        };

        let reason = match report.first_violation() {
            Some(period) => DisputeReason::BalanceBelowMinimum { period },
            None if !report.matches_root(&claim.commitment_root) => DisputeReason::RootMismatch {
                observed: report.commitment_root,
            },
            None => {
                debug!(claim_id = %claim.id, score = report.score, "claim agrees with history");
                return ValidationOutcome::Agreed { score: report.score };
            }
        };

        let profit = &self.config.profit;
        let expected_profit = profit.expected_profit(claim);
        if !profit.is_profitable(expected_profit) {
            info!(
                claim_id = %claim.id,
                ?reason,
                expected_profit,
                "disagreement not worth challenging"
            );
            return ValidationOutcome::Disputed {
                reason,
                expected_profit,
                challenged: false,
            };
        }

        let challenged = match self
            .submitter
            .submit_challenge(claim.id, profit.challenge_stake)
            .await
        {
            Ok(()) => {
                info!(claim_id = %claim.id, ?reason, expected_profit, "challenge submitted");
                metrics::increment_counter!(names::OBSERVER_CHALLENGES);
                true
            }
            Err(e) => {
                warn!(claim_id = %claim.id, error = %e, "challenge submission failed");
                false
            }
        };

        ValidationOutcome::Disputed {
            reason,
            expected_profit,
            challenged,
        }
    }

    async fn fetch_batch(&self, from: u64) -> Result<Vec<LedgerEvent>, ObserverError> {
        let limit = self.config.batch_size;
        with_retry(&self.source_retry, "fetch_events", |_| self.source.fetch(from, limit)).await
    }

    /// Apply events in order; returns `true` when a gap was hit
    async fn apply_events(self: &Arc<Self>, events: &[LedgerEvent], validate: bool) -> bool {
        let mut submitted = Vec::new();
        let mut applied = 0u64;
        let mut gap = false;

        for event in events {
            match self.mirror.apply(event) {
                ApplyOutcome::Applied => {
                    applied += 1;
                    if let LedgerEventKind::ClaimSubmitted { claim } = &event.kind {
                        submitted.push(claim.id);
                    }
                }
                ApplyOutcome::Duplicate => {}
                ApplyOutcome::Gap { expected } => {
                    debug!(expected, position = event.position, "event gap");
                    gap = true;
                    break;
                }
            }
        }

        if applied > 0 {
            let cursor = self.mirror.next_position();
            {
                let mut stats = self.stats.write();
                stats.events_applied += applied;
                stats.cursor = cursor;
            }
            self.events_since_checkpoint.fetch_add(applied, Ordering::SeqCst);
            metrics::counter!(names::OBSERVER_EVENTS_APPLIED, applied);
            metrics::gauge!(names::OBSERVER_CURSOR, cursor as f64);
        }

        if validate {
            for claim_id in submitted {
                if let Some(claim) = self.mirror.get(claim_id) {
                    if claim.status == ClaimStatus::Pending {
                        self.schedule_validation(claim);
                    }
                }
            }
        }
        gap
    }

    async fn on_live_event(self: &Arc<Self>, event: LedgerEvent) {
        if self.apply_events(std::slice::from_ref(&event), true).await {
            self.catch_up_logged().await;
        }
        if self.events_since_checkpoint.load(Ordering::SeqCst) >= self.config.checkpoint_every_events {
            if let Err(e) = self.checkpoint().await {
                error!(observer_id = %self.id, error = %e, "checkpoint failed");
            }
        }
    }

    /// Fetch and apply everything past the cursor
    async fn catch_up(self: &Arc<Self>) -> Result<(), ObserverError> {
        loop {
            let from = self.mirror.next_position();
            let events = self.fetch_batch(from).await?;
            let fetched = events.len();
            if fetched > 0 {
                self.apply_events(&events, true).await;
            }
            if fetched < self.config.batch_size || self.mirror.next_position() == from {
                return Ok(());
            }
        }
    }

    async fn catch_up_logged(self: &Arc<Self>) {
        if let Err(e) = self.catch_up().await {
            warn!(observer_id = %self.id, error = %e, "catch-up failed, will retry");
        }
    }

    fn schedule_pending(self: &Arc<Self>) {
        for claim in self.mirror.pending() {
            self.schedule_validation(claim);
        }
    }

    /// Spawn a validation; the permit is taken by the task so event
    /// consumption never waits on running validations
    fn schedule_validation(self: &Arc<Self>, claim: Claim) {
        if self.outcomes.contains_key(&claim.id) || !self.in_flight.insert(claim.id) {
            return;
        }
        if !claim.window_open(self.clock.now()) {
            debug!(claim_id = %claim.id, "challenge window closed, not validating");
            self.in_flight.remove(&claim.id);
            return;
        }

        self.active.send_modify(|n| *n += 1);
        let permits = self.permits.clone();
        let observer = Arc::clone(self);
        tokio::spawn(async move {
            match permits.acquire_owned().await {
                Ok(_permit) => {
                    let started = Instant::now();
                    let outcome = observer.evaluate(&claim).await;
                    observer.record_outcome(claim.id, outcome, started.elapsed());
                }
                Err(_) => {
                    observer.in_flight.remove(&claim.id);
                }
            }
            observer.active.send_modify(|n| *n = n.saturating_sub(1));
        });
    }

    fn record_outcome(&self, claim_id: ClaimId, outcome: ValidationOutcome, elapsed: Duration) {
        {
            let mut stats = self.stats.write();
            stats.validations += 1;
            stats.average_validation_ms = MetricsUtils::update_average(
                stats.average_validation_ms,
                MetricsUtils::duration_to_ms(elapsed),
                stats.validations,
            );
            match &outcome {
                ValidationOutcome::Agreed { .. } => stats.agreed += 1,
                ValidationOutcome::Disputed { challenged, .. } => {
                    stats.disputed += 1;
                    if *challenged {
                        stats.challenges_submitted += 1;
                    }
                }
                ValidationOutcome::Abandoned { .. } => stats.abandoned += 1,
            }
        }

        if matches!(outcome, ValidationOutcome::Abandoned { .. }) {
            metrics::increment_counter!(names::OBSERVER_ABANDONED);
        }
        metrics::increment_counter!(names::OBSERVER_VALIDATIONS, "outcome" => outcome.label());

        self.outcomes.insert(claim_id, outcome);
        self.in_flight.remove(&claim_id);
    }

    fn note_reconnect(&self) {
        self.stats.write().reconnects += 1;
        metrics::increment_counter!(names::OBSERVER_RECONNECTS);
    }
}
