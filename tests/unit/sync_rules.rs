use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use tenure_protocol::ledger::{ManualClock, ReputationBook};
use tenure_protocol::state::{ClaimId, ValidationError};
use tenure_protocol::sync::{
    CrossChainPayload, InboundOutcome, ReputationSync, SequenceStore, SyncAction, SyncError,
};

use crate::common::{account, chain, sync_config, transports, ScriptedTransport, START_TIME};

fn sync(local: &str) -> (ReputationSync, Arc<ReputationBook>) {
    let book = Arc::new(ReputationBook::new());
    let clock = Arc::new(ManualClock::new(START_TIME, 0));
    (ReputationSync::new(sync_config(local), book.clone(), clock), book)
}

fn payload(subject: &str, action: SyncAction, severity: u8, sequence: u64) -> Vec<u8> {
    CrossChainPayload {
        subject: account(subject),
        action,
        severity,
        sequence,
        source_chain: chain("ethereum"),
    }
    .to_bytes()
}

#[tokio::test]
async fn test_severity_outside_range_is_rejected() {
    let (sync, book) = sync("ethereum");
    let mallory = account("mallory");

    for severity in [0u8, 10, 101, 150] {
        let err = sync.slash(&mallory, severity, "auditor").await.unwrap_err();
        assert_eq!(
            err,
            SyncError::Validation(ValidationError::SeverityOutOfRange {
                severity,
                min: 20,
                max: 100
            })
        );
    }
    assert!(!book.is_blacklisted(&mallory));
    assert!(sync.slash_history(&mallory).is_empty());
}

#[tokio::test]
async fn test_double_slash_and_needless_restore() {
    let (sync, book) = sync("ethereum");
    let mallory = account("mallory");
    book.mint(&mallory, 800, 1_000, ClaimId::new(1), START_TIME);

    let report = sync.slash(&mallory, 25, "auditor").await.unwrap();
    assert!(report.deliveries.is_empty());
    assert!(report.fully_propagated());
    assert_eq!(book.record(&mallory).unwrap().score, 600);
    assert_eq!(book.effective_score(&mallory), 0);

    assert_eq!(
        sync.slash(&mallory, 90, "auditor").await.unwrap_err(),
        SyncError::AlreadyBlacklisted(mallory.clone())
    );
    assert_eq!(book.record(&mallory).unwrap().score, 600);

    sync.restore(&mallory).await.unwrap();
    assert_eq!(book.effective_score(&mallory), 600);
    assert_eq!(
        sync.restore(&mallory).await.unwrap_err(),
        SyncError::NotBlacklisted(mallory.clone())
    );

    let history = sync.slash_history(&mallory);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].severity, 25);
    assert_eq!(history[0].actor, "auditor");
    assert!(history[0].recovered);

    let stats = sync.stats();
    assert_eq!((stats.slashes, stats.restores), (1, 1));
}

#[test]
fn test_destination_needs_two_transports() {
    let (sync, _) = sync("ethereum");
    let only = ScriptedTransport::new("bridge");

    assert_eq!(
        sync.register_chain(chain("polygon"), transports(&[only])).unwrap_err(),
        SyncError::InsufficientTransports {
            chain: chain("polygon"),
            required: 2,
            provided: 1
        }
    );
    assert!(sync.chains().is_empty());
}

#[test]
fn test_inbound_decisions_respect_sequence() {
    let (sync, book) = sync("polygon");
    let mallory = account("mallory");

    assert_eq!(
        sync.receive(&payload("mallory", SyncAction::Blacklist, 40, 3)).unwrap(),
        InboundOutcome::Applied { changed: true }
    );
    assert!(book.is_blacklisted(&mallory));
    assert_eq!(sync.slash_history(&mallory)[0].actor, "chain:ethereum");

    // stale restore is dropped
    assert_eq!(
        sync.receive(&payload("mallory", SyncAction::Restore, 0, 2)).unwrap(),
        InboundOutcome::Dropped { last_accepted: 3 }
    );
    assert!(book.is_blacklisted(&mallory));

    // redundant but fresh
    assert_eq!(
        sync.receive(&payload("mallory", SyncAction::Blacklist, 40, 4)).unwrap(),
        InboundOutcome::Applied { changed: false }
    );

    assert_eq!(
        sync.receive(&payload("mallory", SyncAction::Restore, 0, 5)).unwrap(),
        InboundOutcome::Applied { changed: true }
    );
    assert!(!book.is_blacklisted(&mallory));
    assert_eq!(sync.high_water(&chain("ethereum")), Some(5));

    let stats = sync.stats();
    assert_eq!(stats.inbound_applied, 3);
    assert_eq!(stats.replays_dropped, 1);
}

#[test]
fn test_malformed_inbound_payloads() {
    let (sync, book) = sync("polygon");

    let err = sync
        .receive(&payload("mallory", SyncAction::Blacklist, 5, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::SeverityOutOfRange { severity: 5, .. })
    ));
    // rejected payloads do not move the high-water mark
    assert_eq!(sync.high_water(&chain("ethereum")), None);

    assert!(matches!(sync.receive(&[0xde, 0xad]), Err(SyncError::Decode(_))));
    assert!(book.blacklisted().is_empty());
}

/// Sequence store whose disk is gone
struct BrokenSequenceStore;

#[async_trait]
impl SequenceStore for BrokenSequenceStore {
    async fn load(&self) -> Result<u64, SyncError> {
        Ok(4)
    }

    async fn store(&self, _sequence: u64) -> Result<(), SyncError> {
        Err(SyncError::Persistence("disk full".into()))
    }
}

#[tokio::test]
async fn test_unpersisted_sequence_blocks_the_slash() {
    let (sync, book) = sync("ethereum");
    let sync = sync.with_sequence_store(Arc::new(BrokenSequenceStore));
    sync.register_chain(
        chain("polygon"),
        transports(&[ScriptedTransport::new("bridge-a"), ScriptedTransport::new("bridge-b")]),
    )
    .unwrap();
    let mallory = account("mallory");

    let err = sync.slash(&mallory, 40, "auditor").await.unwrap_err();
    assert_eq!(err, SyncError::Persistence("disk full".into()));
    assert!(err.is_retryable());
    assert!(!book.is_blacklisted(&mallory));
    assert!(sync.slash_history(&mallory).is_empty());
    assert!(sync.pending_redeliveries().is_empty());
}
