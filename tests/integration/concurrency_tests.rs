//! Многопоточные клиенты: мьютекс-обёртка и актор tokio

use super::common::{accounts_row, assert_quiescent, strict_config};
use rustdb_locking::{
    LockManager, LockManagerHandle, ResponseStatus, SharedLockManager, TransactionAction,
    WoundPolicy,
};
use std::thread;

const CLIENTS: i64 = 8;
const REQUESTS_PER_CLIENT: i64 = 4;

/// Каждый клиент читает и пишет пересекающиеся строки, затем фиксируется
fn run_threaded_clients(policy: WoundPolicy) {
    let manager = SharedLockManager::new(strict_config(policy));

    let handles: Vec<_> = (0..CLIENTS)
        .map(|client| {
            let manager = manager.clone();
            thread::spawn(move || {
                let tid = manager.begin_transaction().unwrap();
                for step in 0..REQUESTS_PER_CLIENT {
                    let row = accounts_row((client * 3 + step) % 4);
                    let action = if (client + step) % 2 == 0 {
                        TransactionAction::write(tid, row, format!("{}:{}", client, step))
                    } else {
                        TransactionAction::read(tid, row)
                    };
                    let response = manager.validate_object(action).unwrap();
                    manager.check_invariants().unwrap();
                    if response.status == ResponseStatus::Abort {
                        return;
                    }
                }
                manager
                    .validate_object(TransactionAction::commit(tid))
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    manager.check_invariants().unwrap();
    manager.inspect(assert_quiescent);
}

#[test]
fn test_threaded_clients_with_requeue() {
    run_threaded_clients(WoundPolicy::Requeue);
}

#[test]
fn test_threaded_clients_with_abort() {
    run_threaded_clients(WoundPolicy::Abort);
}

#[tokio::test]
async fn test_actor_serves_concurrent_tasks() -> anyhow::Result<()> {
    let (handle, task) =
        LockManagerHandle::spawn(LockManager::new(strict_config(WoundPolicy::Requeue)));

    let mut clients = Vec::new();
    for client in 0..CLIENTS {
        let handle = handle.clone();
        clients.push(tokio::spawn(async move {
            let tid = handle.begin_transaction().await?;
            for step in 0..REQUESTS_PER_CLIENT {
                let row = accounts_row((client + step) % 3);
                handle
                    .validate_object(TransactionAction::write(tid, row, client.to_string()))
                    .await?;
            }
            handle
                .validate_object(TransactionAction::commit(tid))
                .await?;
            rustdb_locking::Result::Ok(())
        }));
    }
    for client in clients {
        client.await??;
    }

    handle.check_invariants().await?;
    let stats = handle.statistics().await?;
    assert_eq!(stats.commits, CLIENTS as u64);

    handle.shutdown().await?;
    let manager = task.await?;
    assert_quiescent(&manager);
    Ok(())
}
