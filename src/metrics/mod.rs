use std::time::Duration;

/// Metric names recorded through the `metrics` facade
pub mod names {
    pub const CLAIMS_SUBMITTED: &str = "tenure.ledger.claims_submitted";
    pub const CLAIM_TRANSITIONS: &str = "tenure.ledger.transitions";
    pub const PAYOUTS: &str = "tenure.ledger.payouts";
    pub const REENTRANCY_REJECTIONS: &str = "tenure.ledger.reentrancy_rejections";
    pub const ESCROWED_TOTAL: &str = "tenure.ledger.escrowed_total";
    pub const REPUTATION_MINTED: &str = "tenure.ledger.reputation_minted";

    pub const SAMPLER_QUERIES: &str = "tenure.sampler.queries";
    pub const SAMPLER_RUN_DURATION: &str = "tenure.sampler.run_duration_ms";
    pub const RETRY_ATTEMPTS: &str = "tenure.retry.attempts";

    pub const OBSERVER_CURSOR: &str = "tenure.observer.cursor";
    pub const OBSERVER_EVENTS_APPLIED: &str = "tenure.observer.events_applied";
    pub const OBSERVER_CHECKPOINTS: &str = "tenure.observer.checkpoints";
    pub const OBSERVER_VALIDATIONS: &str = "tenure.observer.validations";
    pub const OBSERVER_ABANDONED: &str = "tenure.observer.validations_abandoned";
    pub const OBSERVER_CHALLENGES: &str = "tenure.observer.challenges_submitted";
    pub const OBSERVER_RECONNECTS: &str = "tenure.observer.reconnects";

    pub const SYNC_DELIVERIES: &str = "tenure.sync.deliveries";
    pub const SYNC_DELIVERY_FAILURES: &str = "tenure.sync.delivery_failures";
    pub const SYNC_REPLAYS_DROPPED: &str = "tenure.sync.replays_dropped";
    pub const SYNC_INBOUND_APPLIED: &str = "tenure.sync.inbound_applied";
}

/// Common metrics collection utilities
pub struct MetricsUtils;

impl MetricsUtils {
    /// Incremental mean after observing the `total`-th value
    pub fn update_average(current_avg: f64, new_value: f64, total: u64) -> f64 {
        if total == 0 {
            return new_value;
        }
        (current_avg * (total - 1) as f64 + new_value) / total as f64
    }

    /// Convert duration to milliseconds
    pub fn duration_to_ms(duration: Duration) -> f64 {
        duration.as_secs_f64() * 1000.0
    }
}
