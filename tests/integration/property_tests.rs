//! Случайные нагрузки: инварианты после каждого запроса и отсутствие
//! остаточного состояния после завершения всех транзакций

use super::common::{assert_quiescent, assert_wound_wait_edges, item_pool, test_manager};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustdb_locking::{
    LockManager, ResponseStatus, TransactionAction, TransactionId, WoundPolicy,
};

const MAX_TRANSACTIONS: usize = 12;
const STEPS: usize = 300;

fn submit(lm: &mut LockManager, action: TransactionAction) -> ResponseStatus {
    let response = lm.validate_object(action).unwrap();
    lm.check_invariants().unwrap();
    assert_wound_wait_edges(lm);
    response.status
}

fn run_workload(seed: u64, policy: WoundPolicy) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lm = test_manager(policy);
    let items = item_pool();
    let mut open: Vec<TransactionId> = Vec::new();
    let mut started = 0;

    for _ in 0..STEPS {
        let roll = rng.gen_range(0..10);
        if started < MAX_TRANSACTIONS && (open.is_empty() || roll == 0) {
            open.push(lm.begin_transaction().unwrap());
            started += 1;
            continue;
        }
        if open.is_empty() {
            break;
        }

        let index = rng.gen_range(0..open.len());
        let tid = open[index];
        let item = items[rng.gen_range(0..items.len())].clone();
        let action = match roll {
            0..=4 => TransactionAction::read(tid, item),
            5..=7 => TransactionAction::write(tid, item, format!("v{}", seed)),
            8 => TransactionAction::six(tid, item),
            _ if rng.gen_bool(0.8) => TransactionAction::commit(tid),
            _ => TransactionAction::abort(tid),
        };
        let terminal = action.kind.is_terminal();

        let status = submit(&mut lm, action);
        if terminal || status == ResponseStatus::Abort {
            open.swap_remove(index);
        }
        if terminal && status == ResponseStatus::Success {
            assert!(!lm.is_active(tid));
            assert!(!lm.lock_table().contains_transaction(tid));
        }
    }

    for tid in open {
        submit(&mut lm, TransactionAction::commit(tid));
    }
    assert_quiescent(&lm);
}

#[test]
fn test_random_workloads_with_requeue() {
    for seed in 0..20 {
        run_workload(seed, WoundPolicy::Requeue);
    }
}

#[test]
fn test_random_workloads_with_abort() {
    for seed in 100..120 {
        run_workload(seed, WoundPolicy::Abort);
    }
}
