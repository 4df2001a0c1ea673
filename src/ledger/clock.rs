use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::state::{Period, Timestamp};

/// Source of wall-clock time and of the current ledger period
pub trait Clock: Send + Sync {
    /// Unix time in seconds
    fn now(&self) -> Timestamp;

    /// Latest finished period of the balance ledger
    fn current_period(&self) -> Period;
}

/// Clock derived from the system time and a fixed period length
#[derive(Debug, Clone)]
pub struct SystemClock {
    genesis: Timestamp,
    period_length: Duration,
}

impl SystemClock {
    pub fn new(genesis: Timestamp, period_length: Duration) -> Self {
        Self {
            genesis,
            period_length,
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn current_period(&self) -> Period {
        let millis = self.period_length.as_millis();
        if millis == 0 {
            return 0;
        }
        let elapsed = self.now().saturating_sub(self.genesis) as u128 * 1000;
        (elapsed / millis) as Period
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    period: AtomicU64,
}

impl ManualClock {
    pub fn new(now: Timestamp, period: Period) -> Self {
        Self {
            now: AtomicU64::new(now),
            period: AtomicU64::new(period),
        }
    }

    pub fn set_time(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set_period(&self, period: Period) {
        self.period.store(period, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    fn current_period(&self) -> Period {
        self.period.load(Ordering::SeqCst)
    }
}
