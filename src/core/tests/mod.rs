//! Тесты для модулей ядра


use crate::common::LockManagerConfig;
use crate::core::{DataItem, LockManager};

/// Менеджер с проверкой ацикличности после каждого запроса
pub(crate) fn manager() -> LockManager {
    LockManager::new(LockManagerConfig {
        verify_acyclicity: true,
        ..LockManagerConfig::default()
    })
}

pub(crate) fn row(key: i64) -> DataItem {
    DataItem::row("accounts", key)
}
