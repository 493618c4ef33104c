//! Общие утилиты для интеграционных тестов

use rustdb_locking::common::{init_logging, LoggingConfig};
use rustdb_locking::{DataItem, LockManager, LockManagerConfig, WoundPolicy};

/// Конфигурация с проверкой ацикличности после каждого запроса
pub fn strict_config(wound_policy: WoundPolicy) -> LockManagerConfig {
    LockManagerConfig {
        wound_policy,
        verify_acyclicity: true,
        ..LockManagerConfig::default()
    }
}

/// Менеджер для тестов; логирование включается один раз на процесс
pub fn test_manager(wound_policy: WoundPolicy) -> LockManager {
    init_logging(&LoggingConfig {
        level: "warn".to_string(),
    });
    LockManager::new(strict_config(wound_policy))
}

pub fn accounts_row(key: i64) -> DataItem {
    DataItem::row("accounts", key)
}

/// Набор объектов всех уровней иерархии для случайных нагрузок
pub fn item_pool() -> Vec<DataItem> {
    let mut items = vec![DataItem::database()];
    for table in ["accounts", "orders"] {
        items.push(DataItem::table(table));
        for key in 1..=3i64 {
            items.push(DataItem::row(table, key));
            items.push(DataItem::cell(table, key, "amount"));
        }
    }
    items
}

/// Рёбра графа ожидания ведут только от более молодой транзакции к более старой
pub fn assert_wound_wait_edges(manager: &LockManager) {
    for waiter in manager.active_transactions() {
        for blocker in manager.wait_for_graph().waiting_for(waiter) {
            assert!(
                blocker.is_older_than(waiter),
                "{} waits for younger {}",
                waiter,
                blocker
            );
        }
    }
}

/// Ни одной активной транзакции, блокировки и отложенного запроса
pub fn assert_quiescent(manager: &LockManager) {
    assert!(manager.active_transactions().is_empty());
    assert!(manager.lock_table().is_empty());
    assert!(manager.wait_for_graph().is_empty());
    assert_eq!(manager.waiting_len(), 0);
}
