/*!
# Network Transport Module

Transport capabilities used to carry reputation decisions to remote chains.

## Core Components

### Transport Interface
A [`Transport`] delivers an encoded payload to one destination chain and
reports an explicit result. Transports are independent bridges (for example a
general message-passing bridge and a light-client relay); the sync layer keeps
an ordered list of them per destination and walks it as a fallback chain.

### Delivery Attempts
Every attempt is captured as a [`TransportAttempt`] so a failed propagation can
be audited per transport without control flow driven by errors.

### Metrics
[`TransportMetrics`] counts bytes and failures per transport instance.

## Architecture

```rust
use async_trait::async_trait;
use tenure_protocol::network::{NetworkError, Transport, TransportMetrics};
use tenure_protocol::state::ChainId;

struct Loopback;

#[async_trait]
impl Transport for Loopback {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn deliver(&self, _destination: &ChainId, _payload: &[u8]) -> Result<(), NetworkError> {
        Ok(())
    }

    fn metrics(&self) -> TransportMetrics {
        TransportMetrics::default()
    }
}
```
*/

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use std::time::Duration;

use crate::network::NetworkError;
use crate::state::ChainId;

/// Transport layer for cross-chain delivery
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable transport name used in logs and reports
    fn name(&self) -> &str;

    /// Deliver an encoded payload to a destination chain
    async fn deliver(&self, destination: &ChainId, payload: &[u8]) -> Result<(), NetworkError>;

    /// Get transport metrics
    fn metrics(&self) -> TransportMetrics;
}

/// Result of one transport attempt for one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportAttempt {
    pub transport: String,
    pub elapsed: Duration,
    pub error: Option<NetworkError>,
}

impl TransportAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Transport metrics, surfaced through the sync layer's statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportMetrics {
    pub deliveries: u64,
    pub bytes_sent: u64,
    pub delivery_errors: u64,
    pub average_latency: Duration,
}
