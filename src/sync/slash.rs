//! Append-only slash audit trail.

use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::state::{AccountId, Timestamp};

/// A recorded slash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashRecord {
    pub id: Uuid,
    pub subject: AccountId,
    /// 20 to 100
    pub severity: u8,
    /// Who decided the slash; remote decisions are `chain:<id>`
    pub actor: String,
    pub timestamp: Timestamp,
    /// Set once the subject has been restored
    pub recovered: bool,
}

#[derive(Debug, Default)]
pub struct SlashLog {
    records: RwLock<Vec<SlashRecord>>,
}

impl SlashLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, subject: &AccountId, severity: u8, actor: &str, timestamp: Timestamp) -> SlashRecord {
        let record = SlashRecord {
            id: Uuid::new_v4(),
            subject: subject.clone(),
            severity,
            actor: actor.to_string(),
            timestamp,
            recovered: false,
        };
        self.records.write().push(record.clone());
        record
    }

    /// Flag every outstanding slash of `subject` as recovered
    pub fn mark_recovered(&self, subject: &AccountId) -> usize {
        let mut records = self.records.write();
        let mut marked = 0;
        for record in records.iter_mut().filter(|r| &r.subject == subject && !r.recovered) {
            record.recovered = true;
            marked += 1;
        }
        marked
    }

    /// Slashes of `subject`, oldest first
    pub fn history(&self, subject: &AccountId) -> Vec<SlashRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| &r.subject == subject)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
