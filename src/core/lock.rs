//! Режимы блокировок и таблица блокировок
//!
//! Реализует многогранулярные режимы (IS, IX, S, SIX, X), статические
//! матрицы конфликтов и поглощения, а также таблицу держателей блокировок
//! по каждому режиму.

use crate::common::{Error, Result};
use crate::core::data_item::DataItem;
use crate::core::transaction::TransactionId;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Режим блокировки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockMode {
    /// Intention Shared (IS) - намерение получить Shared блокировку ниже
    IntentionShared,
    /// Intention Exclusive (IX) - намерение получить Exclusive блокировку ниже
    IntentionExclusive,
    /// Shared (S) - разделяемая блокировка для чтения
    Shared,
    /// Shared Intention Exclusive (SIX) - Shared + намерение Exclusive
    SharedIntentionExclusive,
    /// Exclusive (X) - исключительная блокировка для записи
    Exclusive,
}

impl LockMode {
    /// Все режимы в порядке хранения в таблице
    pub const ALL: [LockMode; 5] = [
        LockMode::IntentionShared,
        LockMode::IntentionExclusive,
        LockMode::Shared,
        LockMode::SharedIntentionExclusive,
        LockMode::Exclusive,
    ];

    fn index(self) -> usize {
        match self {
            LockMode::IntentionShared => 0,
            LockMode::IntentionExclusive => 1,
            LockMode::Shared => 2,
            LockMode::SharedIntentionExclusive => 3,
            LockMode::Exclusive => 4,
        }
    }

    /// Строка матрицы конфликтов: режимы, с которыми конфликтует уже
    /// удерживаемый режим `self`
    pub fn conflicts(self) -> &'static [LockMode] {
        use LockMode::*;
        match self {
            IntentionShared => &[Exclusive],
            IntentionExclusive => &[Shared, SharedIntentionExclusive, Exclusive],
            Shared => &[IntentionExclusive, SharedIntentionExclusive, Exclusive],
            SharedIntentionExclusive => &[
                IntentionExclusive,
                Shared,
                SharedIntentionExclusive,
                Exclusive,
            ],
            Exclusive => &[
                IntentionShared,
                IntentionExclusive,
                Shared,
                SharedIntentionExclusive,
                Exclusive,
            ],
        }
    }

    /// Конфликтует ли удерживаемый режим `self` с запрошенным
    pub fn conflicts_with(self, requested: LockMode) -> bool {
        self.conflicts().contains(&requested)
    }

    /// Матрица поглощения: удерживаемые режимы, которые уже обеспечивают
    /// запрошенный режим `self` без изменения состояния
    pub fn satisfied_by(self) -> &'static [LockMode] {
        use LockMode::*;
        match self {
            IntentionShared => &[
                IntentionExclusive,
                Shared,
                SharedIntentionExclusive,
                Exclusive,
            ],
            Shared => &[SharedIntentionExclusive, Exclusive, IntentionExclusive],
            IntentionExclusive => &[Exclusive, SharedIntentionExclusive],
            SharedIntentionExclusive => &[Exclusive],
            // X всегда запрашивается явно
            Exclusive => &[],
        }
    }

    /// Обеспечивает ли удерживаемый режим `held` запрошенный режим `self`
    pub fn is_satisfied_by(self, held: LockMode) -> bool {
        self.satisfied_by().contains(&held)
    }

    /// Режим, которым блокируются предки объекта
    pub fn intention(self) -> LockMode {
        match self {
            LockMode::Shared | LockMode::IntentionShared => LockMode::IntentionShared,
            LockMode::Exclusive | LockMode::IntentionExclusive => LockMode::IntentionExclusive,
            LockMode::SharedIntentionExclusive => LockMode::SharedIntentionExclusive,
        }
    }

    /// Наименьший режим, покрывающий оба режима
    pub fn supremum(self, other: LockMode) -> LockMode {
        use LockMode::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Exclusive, _) | (_, Exclusive) => Exclusive,
            (SharedIntentionExclusive, _) | (_, SharedIntentionExclusive) => {
                SharedIntentionExclusive
            }
            (Shared, IntentionExclusive) | (IntentionExclusive, Shared) => SharedIntentionExclusive,
            (IntentionShared, other) | (other, IntentionShared) => other,
            // Оставшиеся пары совпадают и обработаны первой веткой
            (a, _) => a,
        }
    }

    /// Короткое обозначение режима
    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::IntentionShared => "IS",
            LockMode::IntentionExclusive => "IX",
            LockMode::Shared => "S",
            LockMode::SharedIntentionExclusive => "SIX",
            LockMode::Exclusive => "X",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LockMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IS" => Ok(LockMode::IntentionShared),
            "IX" => Ok(LockMode::IntentionExclusive),
            "S" => Ok(LockMode::Shared),
            "SIX" => Ok(LockMode::SharedIntentionExclusive),
            "X" => Ok(LockMode::Exclusive),
            other => Err(Error::validation(format!("unknown lock mode '{}'", other))),
        }
    }
}

/// Таблица блокировок: для каждого режима отображение объект → держатели
#[derive(Debug, Default)]
pub struct LockTable {
    by_mode: [HashMap<DataItem, HashSet<TransactionId>>; 5],
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Держатели режима `mode` на объекте
    pub fn holders(&self, item: &DataItem, mode: LockMode) -> Vec<TransactionId> {
        let mut holders: Vec<_> = self.by_mode[mode.index()]
            .get(item)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    /// Удерживает ли транзакция режим `mode` на объекте
    pub fn is_held_by(&self, item: &DataItem, mode: LockMode, transaction_id: TransactionId) -> bool {
        self.by_mode[mode.index()]
            .get(item)
            .is_some_and(|set| set.contains(&transaction_id))
    }

    /// Добавляет транзакцию в множество держателей режима
    pub fn insert(&mut self, item: &DataItem, mode: LockMode, transaction_id: TransactionId) {
        let holders = self.by_mode[mode.index()]
            .entry(item.clone())
            .or_default();
        holders.insert(transaction_id);
        assert!(
            mode != LockMode::Exclusive || holders.len() == 1,
            "X on {} held by several transactions: {:?}",
            item,
            holders
        );
    }

    /// Убирает транзакцию из множества держателей режима.
    ///
    /// Паникует, если транзакция этот режим не удерживает.
    pub fn remove(&mut self, item: &DataItem, mode: LockMode, transaction_id: TransactionId) {
        let map = &mut self.by_mode[mode.index()];
        let removed = match map.get_mut(item) {
            Some(holders) => {
                let removed = holders.remove(&transaction_id);
                if holders.is_empty() {
                    map.remove(item);
                }
                removed
            }
            None => false,
        };
        assert!(
            removed,
            "{} does not hold {} on {}",
            transaction_id, mode, item
        );
    }

    /// Держатели других транзакций, конфликтующие с запрошенным режимом
    pub fn conflicting_holders(
        &self,
        item: &DataItem,
        requested: LockMode,
        requester: TransactionId,
    ) -> BTreeSet<TransactionId> {
        let mut conflicting = BTreeSet::new();
        for held in LockMode::ALL {
            if !held.conflicts_with(requested) {
                continue;
            }
            if let Some(holders) = self.by_mode[held.index()].get(item) {
                conflicting.extend(holders.iter().copied().filter(|&tid| tid != requester));
            }
        }
        conflicting
    }

    /// Удаляет транзакцию из всех множеств всей таблицы
    pub fn release_all(&mut self, transaction_id: TransactionId) -> usize {
        let mut released = 0;
        for map in self.by_mode.iter_mut() {
            map.retain(|_, holders| {
                if holders.remove(&transaction_id) {
                    released += 1;
                }
                !holders.is_empty()
            });
        }
        released
    }

    /// Содержится ли транзакция хотя бы в одном множестве
    pub fn contains_transaction(&self, transaction_id: TransactionId) -> bool {
        self.by_mode
            .iter()
            .any(|map| map.values().any(|holders| holders.contains(&transaction_id)))
    }

    /// Все записи таблицы: (объект, режим, держатель)
    pub fn entries(&self) -> Vec<(DataItem, LockMode, TransactionId)> {
        let mut entries = Vec::new();
        for mode in LockMode::ALL {
            for (item, holders) in &self.by_mode[mode.index()] {
                for &tid in holders {
                    entries.push((item.clone(), mode, tid));
                }
            }
        }
        entries.sort();
        entries
    }

    /// Количество удерживаемых блокировок
    pub fn len(&self) -> usize {
        self.by_mode
            .iter()
            .map(|map| map.values().map(HashSet::len).sum::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mode.iter().all(HashMap::is_empty)
    }
}
