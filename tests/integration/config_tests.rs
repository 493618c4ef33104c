//! Конфигурация и журнал предзаписи в файле

use super::common::accounts_row;
use rustdb_locking::logging::{JsonLinesLogSink, LogRecord, LogRecordType};
use rustdb_locking::{
    Error, LockManager, LockManagerConfig, ResponseStatus, TransactionAction, WoundPolicy,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use tempfile::TempDir;

#[test]
fn test_config_from_env() -> anyhow::Result<()> {
    std::env::set_var("RUSTDB_LOCK_WOUND_POLICY", "abort");
    std::env::set_var("RUSTDB_LOCK_VERIFY_ACYCLICITY", "true");
    std::env::set_var("RUSTDB_LOG_LEVEL", "debug");
    let config = LockManagerConfig::from_env()?;
    assert_eq!(config.wound_policy, WoundPolicy::Abort);
    assert!(config.verify_acyclicity);
    assert_eq!(config.logging.level, "debug");

    std::env::set_var("RUSTDB_LOCK_VERIFY_ACYCLICITY", "sometimes");
    assert!(matches!(
        LockManagerConfig::from_env(),
        Err(Error::Configuration { .. })
    ));

    std::env::remove_var("RUSTDB_LOCK_WOUND_POLICY");
    std::env::remove_var("RUSTDB_LOCK_VERIFY_ACYCLICITY");
    std::env::remove_var("RUSTDB_LOG_LEVEL");
    Ok(())
}

#[test]
fn test_manager_from_config_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("locking.toml");
    std::fs::write(&path, "wound_policy = \"abort\"\nverify_acyclicity = true\n")?;

    let mut lm = LockManager::new(LockManagerConfig::from_file(&path)?);
    let t1 = lm.begin_transaction()?;
    let t2 = lm.begin_transaction()?;
    lm.validate_object(TransactionAction::write(t2, accounts_row(1), "2"))?;
    lm.validate_object(TransactionAction::write(t1, accounts_row(1), "1"))?;

    let response = lm.validate_object(TransactionAction::commit(t2))?;
    assert_eq!(response.status, ResponseStatus::Abort);
    Ok(())
}

#[test]
fn test_json_lines_journal() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("locks.wal");
    let sink = JsonLinesLogSink::new(File::create(&path)?);
    let mut lm = LockManager::with_sink(LockManagerConfig::default(), Box::new(sink));

    let t1 = lm.begin_transaction()?;
    lm.validate_object(
        TransactionAction::write(t1, accounts_row(7), "500").with_previous("450"),
    )?;
    lm.validate_object(TransactionAction::commit(t1))?;
    drop(lm);

    let records = BufReader::new(File::open(&path)?)
        .lines()
        .map(|line| Ok(serde_json::from_str::<LogRecord>(&line?)?))
        .collect::<anyhow::Result<Vec<_>>>()?;

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].record_type, LogRecordType::TransactionBegin);
    assert_eq!(records[1].record_type, LogRecordType::DataWrite);
    assert_eq!(records[1].target, Some(accounts_row(7)));
    assert_eq!(records[1].before.as_deref(), Some("450"));
    assert_eq!(records[1].after.as_deref(), Some("500"));
    assert_eq!(records[2].record_type, LogRecordType::TransactionCommit);
    assert_eq!(records[2].transaction_id, t1.value());
    Ok(())
}
