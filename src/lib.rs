//! rustdb-locking - иерархический менеджер блокировок RustDB
//!
//! Подсистема управления конкурентностью транзакционного ядра:
//! многогранулярные блокировки (IS, IX, S, SIX, X) по иерархии
//! База данных → Таблица → Строка → Ячейка, предотвращение дедлоков по
//! схеме wound-wait и повтор отложенных запросов при завершении транзакций.
//!
//! Внешнему коду нужны две точки входа: [`LockManager::begin_transaction`] и
//! [`LockManager::validate_object`]. Для многопоточного использования есть
//! [`SharedLockManager`] и актор [`LockManagerHandle`].

pub mod common;
pub mod core;
pub mod logging;

pub use common::{Error, LockManagerConfig, Result, WoundPolicy};
pub use crate::core::{
    ActionKind, DataItem, LockManager, LockManagerHandle, LockMode, PrimaryKey, Response,
    ResponseStatus, SharedLockManager, TransactionAction, TransactionId,
};

/// Версия библиотеки
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
