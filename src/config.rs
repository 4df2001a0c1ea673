//! Protocol-wide configuration.

use serde::{Serialize, Deserialize};
use std::path::Path;

use crate::ledger::LedgerConfig;
use crate::observer::ObserverConfig;
use crate::sampler::SamplerConfig;
use crate::sync::SyncConfig;
use crate::{Error, Result};

/// Configuration of every component, loadable from JSON.
///
/// Missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub ledger: LedgerConfig,
    pub sampler: SamplerConfig,
    pub observer: ObserverConfig,
    pub sync: SyncConfig,
}

impl ProtocolConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every section and the invariants that span sections
    pub fn validate(&self) -> Result<()> {
        self.ledger.validate().map_err(|e| Error::Config(format!("ledger: {e}")))?;
        self.sampler.validate().map_err(|e| Error::Config(format!("sampler: {e}")))?;
        self.observer.validate().map_err(|e| Error::Config(format!("observer: {e}")))?;
        self.sync.validate().map_err(|e| Error::Config(format!("sync: {e}")))?;

        if self.observer.profit.challenge_stake < self.ledger.min_challenge_stake {
            return Err(Error::Config(format!(
                "observer challenge stake {} is below the ledger minimum {}",
                self.observer.profit.challenge_stake, self.ledger.min_challenge_stake
            )));
        }
        Ok(())
    }
}
