/*!
# State Types

Core identifiers shared by the ledger, sampler, observer and sync layers.

## Core Types

### Chain Identifier
`ChainId` names a ledger (the local source chain or a remote destination).

### Account Identifier
`AccountId` names a claim owner, a challenger or a reputation subject.

### Claim Identifier
`ClaimId` is a ledger-assigned, monotonically increasing integer.

### Commitment Root
`CommitmentRoot` is the 32-byte root of the temporal sample tree.

## Type Relationships

```rust
use tenure_protocol::state::{AccountId, ClaimId, CommitmentRoot};

let owner = AccountId::new("0xabc");
let id = ClaimId::new(7);
let root = CommitmentRoot::zero();

assert_eq!(owner.to_string(), "0xabc");
assert_eq!(id.value(), 7);
assert!(root.is_zero());
```

Amounts are fixed-point integers in base units (`Amount = u128`), periods are
base ledger periods such as block numbers (`Period = u64`) and timestamps are
unix seconds (`Timestamp = u64`).
*/

use std::fmt;
use parity_scale_codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Fixed-point token amount in base units
pub type Amount = u128;

/// Base ledger period (block number)
pub type Period = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Chain identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Encode, Decode, TypeInfo)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ChainId {
    fn default() -> Self {
        Self("local".into())
    }
}

/// Account identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Encode, Decode, TypeInfo)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger-assigned claim identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ClaimId(u64);

impl ClaimId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim-{}", self.0)
    }
}

/// Root of a temporal sample commitment tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct CommitmentRoot(pub [u8; 32]);

impl CommitmentRoot {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn zero() -> Self {
        Self([0; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CommitmentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for CommitmentRoot {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
