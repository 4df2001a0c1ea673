use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::sampler::DataSourceError;
use crate::state::{AccountId, Amount, Period};

/// Read-only historical balance query service
#[async_trait]
pub trait BalanceHistory: Send + Sync {
    /// Balance of `subject` as of the end of `period`
    async fn balance_at(&self, subject: &AccountId, period: Period) -> Result<Amount, DataSourceError>;
}

#[async_trait]
impl<T: BalanceHistory + ?Sized> BalanceHistory for Arc<T> {
    async fn balance_at(&self, subject: &AccountId, period: Period) -> Result<Amount, DataSourceError> {
        (**self).balance_at(subject, period).await
    }
}

/// In-memory balance history.
///
/// Each account's history is a step function: the balance at a period is the
/// value of the latest change at or before it, zero before the first change.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    series: DashMap<AccountId, BTreeMap<Period, Amount>>,
    offline: AtomicBool,
    queries: AtomicU64,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `subject` holds `balance` from `period` onwards
    pub fn set_balance(&self, subject: &AccountId, period: Period, balance: Amount) {
        self.series
            .entry(subject.clone())
            .or_default()
            .insert(period, balance);
    }

    /// Simulate an outage of the query service
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of queries served or refused so far
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceHistory for InMemoryHistory {
    async fn balance_at(&self, subject: &AccountId, period: Period) -> Result<Amount, DataSourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(DataSourceError::Unavailable("history service offline".into()));
        }
        Ok(self
            .series
            .get(subject)
            .and_then(|series| series.range(..=period).next_back().map(|(_, balance)| *balance))
            .unwrap_or(0))
    }
}
