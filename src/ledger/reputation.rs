use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Serialize, Deserialize};

use crate::state::{AccountId, ClaimId, Timestamp};

/// Latest reputation of a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub subject: AccountId,
    /// 0 to 1000
    pub score: u16,
    pub age_in_periods: u64,
    pub last_claim_id: Option<ClaimId>,
    pub updated_at: Timestamp,
}

/// Blacklist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub severity: u8,
    pub since: Timestamp,
}

/// Reputation records and the local blacklist.
///
/// Shared between the claim ledger, which mints scores, and reputation sync,
/// which slashes and restores subjects.
#[derive(Debug, Default)]
pub struct ReputationBook {
    records: DashMap<AccountId, ReputationRecord>,
    blacklist: DashMap<AccountId, BlacklistEntry>,
}

impl ReputationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, subject: &AccountId) -> Option<ReputationRecord> {
        self.records.get(subject).map(|r| r.clone())
    }

    /// Overwrite the subject's record with a freshly minted score
    pub fn mint(
        &self,
        subject: &AccountId,
        score: u16,
        age_in_periods: u64,
        claim_id: ClaimId,
        now: Timestamp,
    ) -> ReputationRecord {
        let record = ReputationRecord {
            subject: subject.clone(),
            score,
            age_in_periods,
            last_claim_id: Some(claim_id),
            updated_at: now,
        };
        self.records.insert(subject.clone(), record.clone());
        record
    }

    /// Score as seen by credit consumers; zero while blacklisted
    pub fn effective_score(&self, subject: &AccountId) -> u16 {
        if self.is_blacklisted(subject) {
            return 0;
        }
        self.records.get(subject).map(|r| r.score).unwrap_or(0)
    }

    pub fn is_blacklisted(&self, subject: &AccountId) -> bool {
        self.blacklist.contains_key(subject)
    }

    pub fn blacklist_entry(&self, subject: &AccountId) -> Option<BlacklistEntry> {
        self.blacklist.get(subject).map(|e| *e)
    }

    /// Blacklist `subject` and cut its score by `severity` percent.
    ///
    /// Returns `false` without touching anything if it was already blacklisted.
    pub fn blacklist(&self, subject: &AccountId, severity: u8, now: Timestamp) -> bool {
        match self.blacklist.entry(subject.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(BlacklistEntry { severity, since: now });
                if let Some(mut record) = self.records.get_mut(subject) {
                    let kept = 100u32.saturating_sub(severity.min(100) as u32);
                    record.score = (record.score as u32 * kept / 100) as u16;
                    record.updated_at = now;
                }
                true
            }
        }
    }

    /// Lift the blacklist. Returns `false` if the subject was not blacklisted.
    pub fn restore(&self, subject: &AccountId, now: Timestamp) -> bool {
        if self.blacklist.remove(subject).is_none() {
            return false;
        }
        if let Some(mut record) = self.records.get_mut(subject) {
            record.updated_at = now;
        }
        true
    }

    pub fn blacklisted(&self) -> Vec<AccountId> {
        self.blacklist.iter().map(|e| e.key().clone()).collect()
    }
}
