#![cfg_attr(not(feature = "std"), no_std)]

pub mod state;
pub mod sampler;
pub mod ledger;
pub mod observer;
pub mod sync;
pub mod network;
pub mod metrics;
pub mod telemetry;
pub mod config;
mod storage;

// Re-exports
pub use sampler::{SamplingMode, SamplingReport, SamplingRequest, TemporalSampler};
pub use ledger::{Claim, ClaimLedger, ClaimStatus, ClaimSubmission};
pub use observer::{ChainObserver, ValidationOutcome};
pub use sync::{CrossChainPayload, PropagationReport, ReputationSync};
pub use config::ProtocolConfig;

// Core types
pub type Result<T> = std::result::Result<T, Error>;
pub use error::Error;

pub mod error;
