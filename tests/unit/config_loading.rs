use std::io::Write;
use std::time::Duration;

use tenure_protocol::{Error, ProtocolConfig};

#[test]
fn test_config_file_round_trip() {
    let mut config = ProtocolConfig::default();
    config.ledger.challenge_window_secs = 3_600;
    config.observer.idle_timeout = Duration::from_secs(5);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_json().unwrap().as_bytes()).unwrap();

    let loaded = ProtocolConfig::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_challenge_stake_below_ledger_minimum() {
    let mut config = ProtocolConfig::default();
    config.observer.profit.challenge_stake = config.ledger.min_challenge_stake - 1;

    let err = config.validate().unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("challenge stake")));
    assert!(!err.is_retryable());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProtocolConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
