use parity_scale_codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Serialize, Deserialize};

use crate::state::{AccountId, ChainId};
use crate::sync::SyncError;

/// Reputation decision carried across chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode, TypeInfo)]
pub enum SyncAction {
    Blacklist,
    Restore,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Blacklist => "blacklist",
            SyncAction::Restore => "restore",
        }
    }
}

/// Cross-chain wire payload, SCALE encoded on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, TypeInfo)]
pub struct CrossChainPayload {
    pub subject: AccountId,
    pub action: SyncAction,
    /// Slash severity; zero for restores
    pub severity: u8,
    /// Per-source sequence number, strictly increasing
    pub sequence: u64,
    pub source_chain: ChainId,
}

impl CrossChainPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode()
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, SyncError> {
        let payload = Self::decode(&mut bytes).map_err(|e| SyncError::Decode(e.to_string()))?;
        if !bytes.is_empty() {
            return Err(SyncError::Decode(format!("{} trailing bytes", bytes.len())));
        }
        Ok(payload)
    }
}
