//! Базовые сценарии совместимости блокировок

use super::common::{accounts_row, test_manager};
use rustdb_locking::{
    ActionKind, DataItem, LockMode, PrimaryKey, ResponseStatus, TransactionAction, WoundPolicy,
};

#[test]
fn test_shared_locks_are_compatible() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();
    let r = accounts_row(1);

    let first = lm.validate_object(TransactionAction::read(t1, r.clone())).unwrap();
    let second = lm.validate_object(TransactionAction::read(t2, r.clone())).unwrap();

    assert!(first.allowed);
    assert!(second.allowed);
    assert_eq!(lm.holders(&r, LockMode::Shared), vec![t1, t2]);
    lm.check_invariants().unwrap();
}

#[test]
fn test_upgrade_shared_to_exclusive() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();
    let r = accounts_row(1);

    lm.validate_object(TransactionAction::read(t1, r.clone())).unwrap();
    let upgrade = lm
        .validate_object(TransactionAction::write(t1, r.clone(), "42"))
        .unwrap();
    assert!(upgrade.allowed);
    assert_eq!(lm.held_mode(t1, &r), Some(LockMode::Exclusive));
    assert!(lm.holders(&r, LockMode::Shared).is_empty());

    let read = lm.validate_object(TransactionAction::read(t2, r.clone())).unwrap();
    assert!(!read.allowed);
    lm.check_invariants().unwrap();
}

#[test]
fn test_shared_request_waits_for_exclusive() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();
    let r = accounts_row(1);

    lm.validate_object(TransactionAction::write(t1, r.clone(), "1"))
        .unwrap();
    let response = lm.validate_object(TransactionAction::read(t2, r)).unwrap();

    assert!(!response.allowed);
    assert_eq!(response.status, ResponseStatus::Wait);
    assert_eq!(response.transaction_id, t2);
}

#[test]
fn test_exclusive_requests_conflict() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();
    let r = accounts_row(1);

    let first = lm
        .validate_object(TransactionAction::write(t1, r.clone(), "1"))
        .unwrap();
    let second = lm
        .validate_object(TransactionAction::write(t2, r.clone(), "2"))
        .unwrap();

    assert!(first.allowed);
    assert!(!second.allowed);
    assert_eq!(lm.holders(&r, LockMode::Exclusive), vec![t1]);
}

#[test]
fn test_waiting_write_is_replayed_after_commit() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();
    let r = accounts_row(1);

    lm.validate_object(TransactionAction::write(t1, r.clone(), "1"))
        .unwrap();
    let denied = lm
        .validate_object(TransactionAction::write(t2, r.clone(), "2"))
        .unwrap();
    assert!(!denied.allowed);

    lm.end_transaction(t1, ActionKind::Commit).unwrap();

    assert_eq!(lm.holders(&r, LockMode::Exclusive), vec![t2]);
    assert_eq!(lm.waiting_len(), 0);
    let again = lm
        .validate_object(TransactionAction::write(t2, r.clone(), "2"))
        .unwrap();
    assert!(again.allowed);
    lm.check_invariants().unwrap();
}

#[test]
fn test_cells_under_different_rows_do_not_conflict() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();

    let a = lm
        .validate_object(TransactionAction::write(
            t1,
            DataItem::cell("accounts", 1, "amount"),
            "10",
        ))
        .unwrap();
    let b = lm
        .validate_object(TransactionAction::write(
            t2,
            DataItem::cell("accounts", 2, "amount"),
            "20",
        ))
        .unwrap();

    assert!(a.allowed && b.allowed);
    assert_eq!(
        lm.holders(&DataItem::table("accounts"), LockMode::IntentionExclusive),
        vec![t1, t2]
    );
}

#[test]
fn test_composite_keys_identify_rows() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();

    let line = DataItem::row("order_lines", PrimaryKey::composite([7, 1]));
    let other_line = DataItem::row("order_lines", PrimaryKey::composite([7, 2]));

    lm.validate_object(TransactionAction::write(t1, line, "x"))
        .unwrap();
    let free = lm
        .validate_object(TransactionAction::write(t2, other_line, "y"))
        .unwrap();
    let busy = lm
        .validate_object(TransactionAction::read(
            t2,
            DataItem::row("order_lines", PrimaryKey::composite([7, 1])),
        ))
        .unwrap();

    assert!(free.allowed);
    assert!(!busy.allowed);
}

#[test]
fn test_table_scan_blocks_row_writers() {
    let mut lm = test_manager(WoundPolicy::Requeue);
    let t1 = lm.begin_transaction().unwrap();
    let t2 = lm.begin_transaction().unwrap();

    lm.validate_object(TransactionAction::read(t1, DataItem::table("accounts")))
        .unwrap();
    let write = lm
        .validate_object(TransactionAction::write(t2, accounts_row(3), "v"))
        .unwrap();
    let read = lm
        .validate_object(TransactionAction::read(t2, DataItem::table("orders")))
        .unwrap();

    assert_eq!(write.status, ResponseStatus::Wait);
    // t2 заблокирована: даже свободный объект не выдаётся до её разблокировки
    assert_eq!(read.status, ResponseStatus::Wait);

    lm.validate_object(TransactionAction::commit(t1)).unwrap();
    assert_eq!(lm.held_mode(t2, &accounts_row(3)), Some(LockMode::Exclusive));
    assert_eq!(
        lm.held_mode(t2, &DataItem::table("orders")),
        Some(LockMode::Shared)
    );
}
