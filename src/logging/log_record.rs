//! Записи журнала предзаписи, которые порождает менеджер блокировок
//!
//! Сам журнал внешний по отношению к подсистеме блокировок; здесь
//! описана только форма записи.

use crate::core::data_item::DataItem;
use crate::core::transaction::{ActionKind, TransactionAction, TransactionId};
use serde::{Deserialize, Serialize};

/// Уникальный идентификатор лог-записи (Log Sequence Number)
pub type LogSequenceNumber = u64;

/// Тип лог-записи
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogRecordType {
    /// Начало транзакции
    TransactionBegin,
    /// Разрешённая запись данных
    DataWrite,
    /// Подтверждение транзакции
    TransactionCommit,
    /// Отмена транзакции
    TransactionAbort,
    /// Откат транзакции, "раненой" более старой транзакцией
    TransactionRollback,
}

/// Лог-запись
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Номер записи; назначается менеджером блокировок
    pub lsn: LogSequenceNumber,
    pub transaction_id: u64,
    pub record_type: LogRecordType,
    /// Объект, к которому относится запись
    pub target: Option<DataItem>,
    /// Прежнее значение (для UNDO)
    pub before: Option<String>,
    /// Новое значение (для REDO)
    pub after: Option<String>,
}

impl LogRecord {
    /// Запись о событии жизненного цикла транзакции
    pub fn lifecycle(
        lsn: LogSequenceNumber,
        transaction_id: TransactionId,
        record_type: LogRecordType,
    ) -> Self {
        Self {
            lsn,
            transaction_id: transaction_id.value(),
            record_type,
            target: None,
            before: None,
            after: None,
        }
    }

    /// Запись для разрешённого действия; `None` для чтений
    pub fn for_action(lsn: LogSequenceNumber, action: &TransactionAction) -> Option<Self> {
        let record_type = match action.kind {
            ActionKind::Start => LogRecordType::TransactionBegin,
            ActionKind::Write => LogRecordType::DataWrite,
            ActionKind::Commit => LogRecordType::TransactionCommit,
            ActionKind::Abort => LogRecordType::TransactionAbort,
            ActionKind::Read | ActionKind::Six => return None,
        };
        Some(Self {
            lsn,
            transaction_id: action.transaction_id.value(),
            record_type,
            target: action.item.clone(),
            before: action.previous.clone(),
            after: action.value.clone(),
        })
    }
}
