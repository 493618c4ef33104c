//! Потокобезопасный доступ к менеджеру блокировок
//!
//! Всё состояние менеджера защищено одним мьютексом, так что каждый вызов
//! выполняется как одна критическая секция. Вызовы не ждут освобождения
//! блокировок данных: конфликт возвращается статусом `wait` или `abort`.

use crate::common::{LockManagerConfig, Result};
use crate::core::lock_manager::{LockManager, LockManagerStats};
use crate::core::transaction::{Response, TransactionAction, TransactionId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Разделяемый между потоками менеджер блокировок
#[derive(Clone)]
pub struct SharedLockManager {
    inner: Arc<Mutex<LockManager>>,
}

impl SharedLockManager {
    /// Создаёт менеджер с заданной конфигурацией
    pub fn new(config: LockManagerConfig) -> Self {
        Self::from_manager(LockManager::new(config))
    }

    /// Оборачивает готовый менеджер (например, с собственным журналом)
    pub fn from_manager(manager: LockManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    pub fn begin_transaction(&self) -> Result<TransactionId> {
        self.inner.lock().begin_transaction()
    }

    pub fn validate_object(&self, action: TransactionAction) -> Result<Response> {
        self.inner.lock().validate_object(action)
    }

    /// Выполняет замыкание над состоянием менеджера под мьютексом
    pub fn inspect<R>(&self, f: impl FnOnce(&LockManager) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn check_invariants(&self) -> Result<()> {
        self.inner.lock().check_invariants()
    }

    pub fn statistics(&self) -> LockManagerStats {
        self.inner.lock().statistics()
    }
}

impl Default for SharedLockManager {
    fn default() -> Self {
        Self::new(LockManagerConfig::default())
    }
}
