/*!
# Reputation Sync

Propagates slash and restore decisions to every registered remote chain and
applies decisions received from them.

## Outbound

[`ReputationSync::slash`] and [`ReputationSync::restore`] first change the
local state (blacklist, audit trail), then fan the decision out to every
registered destination concurrently. Each destination walks its ordered list
of transports: the first one that delivers wins, a failure falls back to the
next. Every attempt is recorded in the destination's [`DeliveryRecord`], and
destinations succeed or fail independently. Partial propagation is a normal
outcome, never an error of the caller.

Sequence numbers come from the injected [`SequenceStore`] and are persisted
before anything is sent, so they keep increasing across restarts. Outbound
decisions are issued and delivered one at a time, so every destination sees
them in sequence order.

## Redelivery

A failed delivery is retained per destination and subject until it arrives
or a newer decision about the same subject reaches that destination.
[`ReputationSync::redeliver_failed`] resends retained decisions. One that the
destination would now drop as stale, because a later sequence already
reached it, is re-issued from the subject's current local state under a
fresh sequence number.

## Inbound

[`ReputationSync::receive`] decodes a payload and checks its sequence number
against the per-source high-water mark. Replays and stale messages are
dropped silently.
*/

mod config;
mod error;
mod message;
mod replay;
mod sequence;
mod slash;

pub use config::{SyncConfig, MAX_SLASH_SEVERITY, MIN_SLASH_SEVERITY};
pub use error::SyncError;
pub use message::{CrossChainPayload, SyncAction};
pub use replay::ReplayGuard;
pub use sequence::{FileSequenceStore, MemorySequenceStore, SequenceStore};
pub use slash::{SlashLog, SlashRecord};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ledger::{Clock, ReputationBook};
use crate::metrics::{names, MetricsUtils};
use crate::network::{
    with_retry, ExponentialBackoff, NetworkError, Transport, TransportAttempt, TransportMetrics,
};
use crate::state::{AccountId, ChainId, ValidationError};

/// Delivery of one payload to one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub destination: ChainId,
    pub sequence: u64,
    /// Attempts in transport order
    pub attempts: Vec<TransportAttempt>,
    pub delivered: bool,
}

impl DeliveryRecord {
    /// Transport that delivered the payload
    pub fn delivered_via(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.succeeded())
            .map(|a| a.transport.as_str())
    }
}

/// Per-destination outcome of one outbound decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub subject: AccountId,
    pub action: SyncAction,
    pub sequence: u64,
    /// Sorted by destination
    pub deliveries: Vec<DeliveryRecord>,
}

impl PropagationReport {
    pub fn delivered_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.delivered).count()
    }

    pub fn failed_destinations(&self) -> Vec<ChainId> {
        self.deliveries
            .iter()
            .filter(|d| !d.delivered)
            .map(|d| d.destination.clone())
            .collect()
    }

    pub fn fully_propagated(&self) -> bool {
        self.deliveries.iter().all(|d| d.delivered)
    }

    pub fn delivery(&self, destination: &ChainId) -> Option<&DeliveryRecord> {
        self.deliveries.iter().find(|d| &d.destination == destination)
    }
}

/// Result of handling an inbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundOutcome {
    /// Accepted; `changed` is false when the local state already matched
    Applied { changed: bool },
    /// Sequence at or below the source's high-water mark
    Dropped { last_accepted: u64 },
}

/// Sync statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub slashes: u64,
    pub restores: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub fallbacks_used: u64,
    pub redeliveries: u64,
    pub superseded: u64,
    pub reissued: u64,
    pub inbound_applied: u64,
    pub replays_dropped: u64,
    pub average_delivery_ms: f64,
    /// Per destination and transport, in fallback order
    pub transports: Vec<(ChainId, String, TransportMetrics)>,
}

/// Cross-chain reputation propagation
pub struct ReputationSync {
    config: SyncConfig,
    reputation: Arc<ReputationBook>,
    clock: Arc<dyn Clock>,
    routes: RwLock<BTreeMap<ChainId, Vec<Arc<dyn Transport>>>>,
    sequences: Arc<dyn SequenceStore>,
    /// Last issued sequence, loaded lazily; held across a whole outbound round
    outbound: Mutex<Option<u64>>,
    replay: ReplayGuard,
    slashes: SlashLog,
    failed: DashMap<(ChainId, AccountId), CrossChainPayload>,
    delivered_up_to: DashMap<ChainId, u64>,
    retry: Arc<ExponentialBackoff>,
    stats: RwLock<SyncStats>,
}

impl ReputationSync {
    pub fn new(config: SyncConfig, reputation: Arc<ReputationBook>, clock: Arc<dyn Clock>) -> Self {
        let retry = Arc::new(ExponentialBackoff::new(config.transport_retry.clone()));
        Self {
            config,
            reputation,
            clock,
            routes: RwLock::new(BTreeMap::new()),
            sequences: Arc::new(MemorySequenceStore::new()),
            outbound: Mutex::new(None),
            replay: ReplayGuard::new(),
            slashes: SlashLog::new(),
            failed: DashMap::new(),
            delivered_up_to: DashMap::new(),
            retry,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Persist outbound sequence numbers in `store` instead of memory
    pub fn with_sequence_store(mut self, store: Arc<dyn SequenceStore>) -> Self {
        self.sequences = store;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Register a destination with its transports in fallback order
    pub fn register_chain(&self, chain: ChainId, transports: Vec<Arc<dyn Transport>>) -> Result<(), SyncError> {
        if transports.len() < self.config.min_transports_per_chain {
            return Err(SyncError::InsufficientTransports {
                chain,
                required: self.config.min_transports_per_chain,
                provided: transports.len(),
            });
        }
        info!(
            chain = %chain,
            transports = ?transports.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
            "registered destination chain"
        );
        self.routes.write().insert(chain, transports);
        Ok(())
    }

    pub fn chains(&self) -> Vec<ChainId> {
        self.routes.read().keys().cloned().collect()
    }

    /// Blacklist `subject` locally and propagate the decision
    pub async fn slash(
        &self,
        subject: &AccountId,
        severity: u8,
        actor: &str,
    ) -> Result<PropagationReport, SyncError> {
        if severity < self.config.min_severity || severity > self.config.max_severity {
            return Err(ValidationError::SeverityOutOfRange {
                severity,
                min: self.config.min_severity,
                max: self.config.max_severity,
            }
            .into());
        }

        let mut last = self.outbound.lock().await;
        if self.reputation.is_blacklisted(subject) {
            return Err(SyncError::AlreadyBlacklisted(subject.clone()));
        }
        let sequence = self.next_sequence(&mut last).await?;

        let now = self.clock.now();
        if !self.reputation.blacklist(subject, severity, now) {
            return Err(SyncError::AlreadyBlacklisted(subject.clone()));
        }
        self.slashes.append(subject, severity, actor, now);
        self.stats.write().slashes += 1;
        info!(subject = %subject, severity, actor, sequence, "subject slashed");

        let payload = self.outbound(subject, SyncAction::Blacklist, severity, sequence);
        Ok(self.propagate(payload).await)
    }

    /// Lift the blacklist on `subject` locally and propagate the decision
    pub async fn restore(&self, subject: &AccountId) -> Result<PropagationReport, SyncError> {
        let mut last = self.outbound.lock().await;
        if !self.reputation.is_blacklisted(subject) {
            return Err(SyncError::NotBlacklisted(subject.clone()));
        }
        let sequence = self.next_sequence(&mut last).await?;

        let now = self.clock.now();
        if !self.reputation.restore(subject, now) {
            return Err(SyncError::NotBlacklisted(subject.clone()));
        }
        let recovered = self.slashes.mark_recovered(subject);
        self.stats.write().restores += 1;
        info!(subject = %subject, recovered, sequence, "subject restored");

        let payload = self.outbound(subject, SyncAction::Restore, 0, sequence);
        Ok(self.propagate(payload).await)
    }

    /// Apply a payload received from a remote chain
    pub fn receive(&self, bytes: &[u8]) -> Result<InboundOutcome, SyncError> {
        let payload = CrossChainPayload::from_bytes(bytes)?;
        if payload.action == SyncAction::Blacklist
            && (payload.severity < self.config.min_severity || payload.severity > self.config.max_severity)
        {
            return Err(ValidationError::SeverityOutOfRange {
                severity: payload.severity,
                min: self.config.min_severity,
                max: self.config.max_severity,
            }
            .into());
        }

        if let Err(last_accepted) = self.replay.accept(&payload.source_chain, payload.sequence) {
            debug!(
                source = %payload.source_chain,
                sequence = payload.sequence,
                last_accepted,
                "dropping replayed payload"
            );
            self.stats.write().replays_dropped += 1;
            metrics::increment_counter!(names::SYNC_REPLAYS_DROPPED);
            return Ok(InboundOutcome::Dropped { last_accepted });
        }

        let now = self.clock.now();
        let changed = match payload.action {
            SyncAction::Blacklist => {
                let changed = self.reputation.blacklist(&payload.subject, payload.severity, now);
                if changed {
                    let actor = format!("chain:{}", payload.source_chain);
                    self.slashes.append(&payload.subject, payload.severity, &actor, now);
                }
                changed
            }
            SyncAction::Restore => {
                let changed = self.reputation.restore(&payload.subject, now);
                if changed {
                    self.slashes.mark_recovered(&payload.subject);
                }
                changed
            }
        };

        info!(
            source = %payload.source_chain,
            sequence = payload.sequence,
            subject = %payload.subject,
            action = payload.action.as_str(),
            changed,
            "inbound decision applied"
        );
        self.stats.write().inbound_applied += 1;
        metrics::increment_counter!(names::SYNC_INBOUND_APPLIED, "action" => payload.action.as_str());
        Ok(InboundOutcome::Applied { changed })
    }

    /// Retry every retained failed delivery.
    ///
    /// Each destination receives its retained decisions in sequence order and
    /// stops at the first one that fails again. A decision the destination
    /// would drop as stale is re-issued from the subject's current local
    /// state under a fresh sequence number. Sequence store failures leave the
    /// affected decisions retained.
    pub async fn redeliver_failed(&self) -> Vec<DeliveryRecord> {
        let mut last = self.outbound.lock().await;

        let mut pending: BTreeMap<ChainId, Vec<CrossChainPayload>> = BTreeMap::new();
        for entry in self.failed.iter() {
            let (chain, _) = entry.key();
            pending.entry(chain.clone()).or_default().push(entry.value().clone());
        }

        let mut queues = BTreeMap::new();
        for (destination, mut payloads) in pending {
            payloads.sort_by_key(|p| p.sequence);
            let delivered_up_to = self.delivered_up_to(&destination);
            let mut fresh = Vec::new();
            let mut queue = Vec::with_capacity(payloads.len());
            for payload in payloads {
                if delivered_up_to.map_or(true, |high| payload.sequence > high) {
                    queue.push(payload);
                    continue;
                }
                let sequence = match self.next_sequence(&mut last).await {
                    Ok(sequence) => sequence,
                    Err(e) => {
                        error!(destination = %destination, error = %e, "cannot re-issue stale decision");
                        continue;
                    }
                };
                let reissued = self.current_decision(&payload.subject, sequence);
                info!(
                    destination = %destination,
                    subject = %reissued.subject,
                    stale = payload.sequence,
                    sequence,
                    action = reissued.action.as_str(),
                    "re-issuing stale decision"
                );
                self.stats.write().reissued += 1;
                self.failed
                    .insert((destination.clone(), reissued.subject.clone()), reissued.clone());
                fresh.push(reissued);
            }
            queue.extend(fresh);
            queues.insert(destination, queue);
        }

        let routes = self.routes.read().clone();
        let mut set = JoinSet::new();
        for (destination, payloads) in queues {
            let Some(transports) = routes.get(&destination).cloned() else {
                warn!(destination = %destination, "no route for retained deliveries");
                continue;
            };
            let timeout = self.config.delivery_timeout;
            let retry = self.retry.clone();
            set.spawn(async move {
                let mut sent = Vec::with_capacity(payloads.len());
                for payload in payloads {
                    let record = deliver_to(
                        destination.clone(),
                        payload.sequence,
                        transports.clone(),
                        payload.to_bytes(),
                        timeout,
                        retry.clone(),
                    )
                    .await;
                    let delivered = record.delivered;
                    sent.push((payload, record));
                    if !delivered {
                        break;
                    }
                }
                sent
            });
        }

        let mut sent = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(batch) => sent.extend(batch),
                Err(e) => error!(error = %e, "redelivery task failed"),
            }
        }
        sent.sort_by(|(_, a), (_, b)| (&a.destination, a.sequence).cmp(&(&b.destination, b.sequence)));

        self.stats.write().redeliveries += sent.len() as u64;
        for (payload, record) in &sent {
            self.track(payload, record);
        }
        let records: Vec<_> = sent.into_iter().map(|(_, record)| record).collect();
        self.settle(&records);
        records
    }

    /// Retained deliveries awaiting a retry
    pub fn pending_redeliveries(&self) -> Vec<(ChainId, u64)> {
        let mut keys: Vec<_> = self
            .failed
            .iter()
            .map(|e| (e.key().0.clone(), e.value().sequence))
            .collect();
        keys.sort();
        keys
    }

    /// Metrics reported by every registered transport
    pub fn transport_metrics(&self) -> Vec<(ChainId, String, TransportMetrics)> {
        self.routes
            .read()
            .iter()
            .flat_map(|(chain, transports)| {
                transports
                    .iter()
                    .map(move |t| (chain.clone(), t.name().to_string(), t.metrics()))
            })
            .collect()
    }

    pub fn slash_history(&self, subject: &AccountId) -> Vec<SlashRecord> {
        self.slashes.history(subject)
    }

    pub fn is_blacklisted(&self, subject: &AccountId) -> bool {
        self.reputation.is_blacklisted(subject)
    }

    pub fn high_water(&self, source: &ChainId) -> Option<u64> {
        self.replay.high_water(source)
    }

    pub fn stats(&self) -> SyncStats {
        let mut stats = self.stats.read().clone();
        stats.transports = self.transport_metrics();
        stats
    }

    /// Allocate the next sequence number and persist it before use
    async fn next_sequence(&self, last: &mut Option<u64>) -> Result<u64, SyncError> {
        let current = match *last {
            Some(current) => current,
            None => self.sequences.load().await?,
        };
        let next = current + 1;
        self.sequences.store(next).await?;
        *last = Some(next);
        Ok(next)
    }

    fn outbound(&self, subject: &AccountId, action: SyncAction, severity: u8, sequence: u64) -> CrossChainPayload {
        CrossChainPayload {
            subject: subject.clone(),
            action,
            severity,
            sequence,
            source_chain: self.config.local_chain.clone(),
        }
    }

    fn current_decision(&self, subject: &AccountId, sequence: u64) -> CrossChainPayload {
        match self.reputation.blacklist_entry(subject) {
            Some(entry) => self.outbound(subject, SyncAction::Blacklist, entry.severity, sequence),
            None => self.outbound(subject, SyncAction::Restore, 0, sequence),
        }
    }

    fn delivered_up_to(&self, destination: &ChainId) -> Option<u64> {
        self.delivered_up_to.get(destination).map(|high| *high)
    }

    /// Record the fate of `payload` at one destination
    fn track(&self, payload: &CrossChainPayload, record: &DeliveryRecord) {
        let key = (record.destination.clone(), payload.subject.clone());
        let superseded = if record.delivered {
            self.delivered_up_to
                .entry(record.destination.clone())
                .and_modify(|high| *high = (*high).max(payload.sequence))
                .or_insert(payload.sequence);
            match self.failed.remove_if(&key, |_, retained| retained.sequence <= payload.sequence) {
                Some((_, retained)) => retained.sequence < payload.sequence,
                None => false,
            }
        } else {
            match self.failed.get(&key).map(|retained| retained.sequence) {
                Some(retained) if retained > payload.sequence => false,
                previous => {
                    self.failed.insert(key, payload.clone());
                    previous.map_or(false, |retained| retained < payload.sequence)
                }
            }
        };
        if superseded {
            debug!(
                destination = %record.destination,
                subject = %payload.subject,
                sequence = payload.sequence,
                "retained decision superseded"
            );
            self.stats.write().superseded += 1;
        }
    }

    async fn propagate(&self, payload: CrossChainPayload) -> PropagationReport {
        let bytes = payload.to_bytes();
        let routes = self.routes.read().clone();

        let mut set = JoinSet::new();
        for (destination, transports) in routes {
            set.spawn(deliver_to(
                destination,
                payload.sequence,
                transports,
                bytes.clone(),
                self.config.delivery_timeout,
                self.retry.clone(),
            ));
        }

        let mut deliveries = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(record) => deliveries.push(record),
                Err(e) => error!(error = %e, "delivery task failed"),
            }
        }
        deliveries.sort_by(|a, b| a.destination.cmp(&b.destination));

        for record in &deliveries {
            self.track(&payload, record);
        }
        self.settle(&deliveries);

        let report = PropagationReport {
            subject: payload.subject,
            action: payload.action,
            sequence: payload.sequence,
            deliveries,
        };
        if !report.fully_propagated() {
            warn!(
                sequence = report.sequence,
                failed = ?report.failed_destinations(),
                "partial propagation"
            );
        }
        report
    }

    /// Update statistics after a round of deliveries
    fn settle(&self, records: &[DeliveryRecord]) {
        let mut stats = self.stats.write();
        for record in records {
            let total = stats.deliveries_succeeded + stats.deliveries_failed + 1;
            let elapsed: Duration = record.attempts.iter().map(|a| a.elapsed).sum();
            stats.average_delivery_ms = MetricsUtils::update_average(
                stats.average_delivery_ms,
                MetricsUtils::duration_to_ms(elapsed),
                total,
            );
            if record.delivered {
                stats.deliveries_succeeded += 1;
                if record.attempts.len() > 1 {
                    stats.fallbacks_used += 1;
                }
            } else {
                stats.deliveries_failed += 1;
            }
        }
    }
}

/// Walk `transports` in order until one delivers `payload` to `destination`
async fn deliver_to(
    destination: ChainId,
    sequence: u64,
    transports: Vec<Arc<dyn Transport>>,
    payload: Vec<u8>,
    timeout: Duration,
    retry: Arc<ExponentialBackoff>,
) -> DeliveryRecord {
    let mut attempts = Vec::with_capacity(transports.len());
    let mut delivered = false;

    for transport in &transports {
        let started = Instant::now();
        let (transport, dest, bytes) = (transport.as_ref(), &destination, payload.as_slice());
        let result: Result<(), NetworkError> = with_retry(retry.as_ref(), transport.name(), |_| async move {
            match tokio::time::timeout(timeout, transport.deliver(dest, bytes)).await {
                Ok(result) => result,
                Err(_) => Err(NetworkError::Timeout(format!("no answer within {timeout:?}"))),
            }
        })
        .await;

        let attempt = TransportAttempt {
            transport: transport.name().to_string(),
            elapsed: started.elapsed(),
            error: result.err(),
        };
        let succeeded = attempt.succeeded();
        match &attempt.error {
            None => {
                info!(destination = %destination, sequence, transport = transport.name(), "payload delivered");
                metrics::increment_counter!(names::SYNC_DELIVERIES, "transport" => transport.name().to_string());
            }
            Some(e) => {
                warn!(
                    destination = %destination,
                    sequence,
                    transport = transport.name(),
                    error = %e,
                    "transport failed, falling back"
                );
                metrics::increment_counter!(names::SYNC_DELIVERY_FAILURES, "transport" => transport.name().to_string());
            }
        }
        attempts.push(attempt);
        if succeeded {
            delivered = true;
            break;
        }
    }

    if !delivered {
        error!(destination = %destination, sequence, "every transport failed");
    }

    DeliveryRecord {
        id: Uuid::new_v4(),
        destination,
        sequence,
        attempts,
        delivered,
    }
}
