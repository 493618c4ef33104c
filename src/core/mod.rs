//! Ядро подсистемы управления конкурентностью

pub mod actor;
pub mod concurrency;
pub mod data_item;
pub mod lock;
pub mod lock_manager;
pub mod transaction;
pub mod wait_for_graph;
pub mod waiting_queue;

// Переэкспортируем основные типы
pub use actor::LockManagerHandle;
pub use concurrency::SharedLockManager;
pub use data_item::{DataItem, Granularity, KeyPart, PrimaryKey};
pub use lock::{LockMode, LockTable};
pub use lock_manager::{LockDecision, LockManager, LockManagerStats};
pub use transaction::{
    ActionKind, Response, ResponseStatus, TransactionAction, TransactionId, TransactionRegistry,
};
pub use wait_for_graph::WaitForGraph;
pub use waiting_queue::{QueuedRequest, WaitingQueue};

#[cfg(test)]
pub mod tests;
