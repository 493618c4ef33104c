//! Транзакции, запросы и реестр транзакций
//!
//! Запрос к менеджеру блокировок описывается [`TransactionAction`], результат
//! его обработки - [`Response`]. Реестр хранит для каждой активной транзакции
//! удерживаемые режимы по объектам и общий журнал действий.

use crate::common::{Error, Result};
use crate::core::data_item::DataItem;
use crate::core::lock::LockMode;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Уникальный идентификатор транзакции; меньший id означает более раннее начало
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Начата ли `self` раньше `other`
    pub fn is_older_than(&self, other: TransactionId) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TXN{}", self.0)
    }
}

/// Вид действия транзакции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Служебное действие, порождаемое `begin_transaction`
    Start,
    Read,
    Write,
    Six,
    Commit,
    Abort,
}

impl ActionKind {
    /// Режим блокировки, который требуется действию над объектом
    pub fn lock_mode(self) -> Option<LockMode> {
        match self {
            ActionKind::Read => Some(LockMode::Shared),
            ActionKind::Write => Some(LockMode::Exclusive),
            ActionKind::Six => Some(LockMode::SharedIntentionExclusive),
            ActionKind::Start | ActionKind::Commit | ActionKind::Abort => None,
        }
    }

    /// Завершает ли действие транзакцию
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionKind::Commit | ActionKind::Abort)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Read => "read",
            ActionKind::Write => "write",
            ActionKind::Six => "six",
            ActionKind::Commit => "commit",
            ActionKind::Abort => "abort",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    /// Разбирает действие, которое может прийти от клиента; `start`
    /// клиентом не отправляется и здесь не принимается
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(ActionKind::Read),
            "write" => Ok(ActionKind::Write),
            "six" => Ok(ActionKind::Six),
            "commit" => Ok(ActionKind::Commit),
            "abort" => Ok(ActionKind::Abort),
            other => Err(Error::validation(format!(
                "invalid action '{}', expected one of read, write, six, commit, abort",
                other
            ))),
        }
    }
}

/// Запрос транзакции к менеджеру блокировок
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAction {
    pub transaction_id: TransactionId,
    pub kind: ActionKind,
    /// Целевой объект; у `start`, `commit` и `abort` отсутствует
    pub item: Option<DataItem>,
    /// Новое значение для записи
    pub value: Option<String>,
    /// Прежнее значение, если вызывающий его знает (before-image для журнала)
    pub previous: Option<String>,
}

impl TransactionAction {
    fn new(transaction_id: TransactionId, kind: ActionKind, item: Option<DataItem>) -> Self {
        Self {
            transaction_id,
            kind,
            item,
            value: None,
            previous: None,
        }
    }

    pub fn start(transaction_id: TransactionId) -> Self {
        Self::new(transaction_id, ActionKind::Start, None)
    }

    pub fn read(transaction_id: TransactionId, item: DataItem) -> Self {
        Self::new(transaction_id, ActionKind::Read, Some(item))
    }

    pub fn write(transaction_id: TransactionId, item: DataItem, value: impl Into<String>) -> Self {
        let mut action = Self::new(transaction_id, ActionKind::Write, Some(item));
        action.value = Some(value.into());
        action
    }

    pub fn six(transaction_id: TransactionId, item: DataItem) -> Self {
        Self::new(transaction_id, ActionKind::Six, Some(item))
    }

    pub fn commit(transaction_id: TransactionId) -> Self {
        Self::new(transaction_id, ActionKind::Commit, None)
    }

    pub fn abort(transaction_id: TransactionId) -> Self {
        Self::new(transaction_id, ActionKind::Abort, None)
    }

    /// Строит действие из строкового вида, например полученного от клиента
    pub fn parse(
        transaction_id: TransactionId,
        kind: &str,
        item: Option<DataItem>,
        value: Option<String>,
    ) -> Result<Self> {
        let kind: ActionKind = kind.parse()?;
        let mut action = Self::new(transaction_id, kind, item);
        action.value = value;
        Ok(action)
    }

    /// Добавляет прежнее значение объекта
    pub fn with_previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.transaction_id, self.kind)?;
        if let Some(item) = &self.item {
            write!(f, " {}", item)?;
        }
        if let Some(value) = &self.value {
            write!(f, " = {}", value)?;
        }
        Ok(())
    }
}

/// Итог обработки запроса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    /// Запрос отложен в очередь ожидания
    Wait,
    /// Транзакция принудительно отменена
    Abort,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Success => write!(f, "success"),
            ResponseStatus::Wait => write!(f, "wait"),
            ResponseStatus::Abort => write!(f, "abort"),
        }
    }
}

/// Ответ менеджера блокировок
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub allowed: bool,
    pub status: ResponseStatus,
    pub transaction_id: TransactionId,
    pub message: String,
}

impl Response {
    pub fn success(transaction_id: TransactionId, message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            status: ResponseStatus::Success,
            transaction_id,
            message: message.into(),
        }
    }

    pub fn wait(transaction_id: TransactionId, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            status: ResponseStatus::Wait,
            transaction_id,
            message: message.into(),
        }
    }

    pub fn abort(transaction_id: TransactionId, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            status: ResponseStatus::Abort,
            transaction_id,
            message: message.into(),
        }
    }
}

/// Реестр транзакций: удерживаемые режимы и журнал действий
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    /// Активные транзакции: id -> (объект -> удерживаемый режим)
    lock_maps: HashMap<TransactionId, HashMap<DataItem, LockMode>>,
    /// Журнал действий в порядке добавления
    log: Vec<TransactionAction>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует новую транзакцию с пустой картой блокировок
    pub fn register(&mut self, transaction_id: TransactionId) {
        let previous = self.lock_maps.insert(transaction_id, HashMap::new());
        assert!(previous.is_none(), "{} registered twice", transaction_id);
    }

    pub fn is_active(&self, transaction_id: TransactionId) -> bool {
        self.lock_maps.contains_key(&transaction_id)
    }

    /// Режим, который транзакция удерживает на объекте
    pub fn mode(&self, transaction_id: TransactionId, item: &DataItem) -> Option<LockMode> {
        self.lock_maps
            .get(&transaction_id)
            .and_then(|locks| locks.get(item))
            .copied()
    }

    /// Записывает новый режим транзакции на объекте
    pub fn set_mode(&mut self, transaction_id: TransactionId, item: &DataItem, mode: LockMode) {
        let locks = self
            .lock_maps
            .get_mut(&transaction_id)
            .unwrap_or_else(|| panic!("{} is not active", transaction_id));
        locks.insert(item.clone(), mode);
    }

    /// Удерживаемые транзакцией блокировки, упорядоченные по объекту
    pub fn locks(&self, transaction_id: TransactionId) -> BTreeMap<DataItem, LockMode> {
        self.lock_maps
            .get(&transaction_id)
            .map(|locks| locks.iter().map(|(item, mode)| (item.clone(), *mode)).collect())
            .unwrap_or_default()
    }

    /// Забирает все блокировки транзакции, оставляя её активной
    pub fn take_locks(&mut self, transaction_id: TransactionId) -> HashMap<DataItem, LockMode> {
        self.lock_maps
            .get_mut(&transaction_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Удаляет транзакцию из реестра и возвращает её блокировки
    pub fn remove(&mut self, transaction_id: TransactionId) -> Option<HashMap<DataItem, LockMode>> {
        self.lock_maps.remove(&transaction_id)
    }

    /// Идентификаторы активных транзакций по возрастанию
    pub fn active_ids(&self) -> Vec<TransactionId> {
        let mut ids: Vec<_> = self.lock_maps.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Добавляет действие в журнал
    pub fn append_log(&mut self, action: TransactionAction) {
        self.log.push(action);
    }

    pub fn log(&self) -> &[TransactionAction] {
        &self.log
    }

    /// Удаляет из журнала незавершённые действия транзакции и возвращает их
    /// в исходном порядке; запись `start` остаётся
    pub fn remove_log_entries(&mut self, transaction_id: TransactionId) -> Vec<TransactionAction> {
        let mut removed = Vec::new();
        self.log.retain(|action| {
            if action.transaction_id != transaction_id || action.kind == ActionKind::Start {
                return true;
            }
            removed.push(action.clone());
            false
        });
        removed
    }
}
