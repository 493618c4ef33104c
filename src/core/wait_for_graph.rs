//! Граф ожидания транзакций
//!
//! Ребро `waiter → blocker` означает, что `waiter` заблокирована до
//! завершения `blocker`. Wound-wait строит только рёбра от более молодой
//! транзакции к более старой, поэтому циклов не возникает; поиск циклов
//! оставлен для проверки этого свойства.

use crate::core::transaction::TransactionId;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Граф ожидания
#[derive(Debug, Default, Clone)]
pub struct WaitForGraph {
    /// Рёбра графа: транзакция -> множество транзакций, которых она ждет
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет ребро (повторное добавление ничего не меняет)
    pub fn add_edge(&mut self, waiter: TransactionId, blocker: TransactionId) {
        self.edges.entry(waiter).or_default().insert(blocker);
    }

    /// Удаляет одно ребро; пустое множество ожидания удаляется
    pub fn delete_edge(&mut self, waiter: TransactionId, blocker: TransactionId) -> bool {
        let Some(blockers) = self.edges.get_mut(&waiter) else {
            return false;
        };
        let removed = blockers.remove(&blocker);
        if blockers.is_empty() {
            self.edges.remove(&waiter);
        }
        removed
    }

    /// Удаляет все рёбра, связанные с транзакцией, в обоих направлениях
    pub fn delete_node(&mut self, transaction: TransactionId) {
        self.edges.remove(&transaction);
        self.edges.retain(|_, blockers| {
            blockers.remove(&transaction);
            !blockers.is_empty()
        });
    }

    /// Ждёт ли транзакция кого-нибудь
    pub fn is_waiting(&self, transaction: TransactionId) -> bool {
        self.edges
            .get(&transaction)
            .is_some_and(|blockers| !blockers.is_empty())
    }

    /// Транзакции, которых ждёт данная
    pub fn waiting_for(&self, transaction: TransactionId) -> BTreeSet<TransactionId> {
        self.edges
            .get(&transaction)
            .map(|blockers| blockers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Транзакции, которые ждут данную
    pub fn waiters_of(&self, transaction: TransactionId) -> BTreeSet<TransactionId> {
        self.edges
            .iter()
            .filter(|(_, blockers)| blockers.contains(&transaction))
            .map(|(&waiter, _)| waiter)
            .collect()
    }

    /// Упоминается ли транзакция в графе
    pub fn contains(&self, transaction: TransactionId) -> bool {
        self.edges.contains_key(&transaction)
            || self
                .edges
                .values()
                .any(|blockers| blockers.contains(&transaction))
    }

    /// Количество рёбер
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Есть ли в графе цикл
    pub fn is_cyclic(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Находит цикл, если он есть
    pub fn find_cycle(&self) -> Option<Vec<TransactionId>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        // Стабильный порядок обхода для воспроизводимого результата
        let mut roots: Vec<_> = self.edges.keys().copied().collect();
        roots.sort();

        for transaction in roots {
            if !visited.contains(&transaction) {
                if let Some(cycle) =
                    self.dfs_detect_cycle(transaction, &mut visited, &mut rec_stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Поиск в глубину со стеком рекурсии
    fn dfs_detect_cycle(
        &self,
        transaction: TransactionId,
        visited: &mut HashSet<TransactionId>,
        rec_stack: &mut HashSet<TransactionId>,
        path: &mut Vec<TransactionId>,
    ) -> Option<Vec<TransactionId>> {
        visited.insert(transaction);
        rec_stack.insert(transaction);
        path.push(transaction);

        if let Some(neighbors) = self.edges.get(&transaction) {
            for &neighbor in neighbors {
                if !visited.contains(&neighbor) {
                    if let Some(cycle) = self.dfs_detect_cycle(neighbor, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(&neighbor) {
                    let cycle_start = path.iter().position(|&t| t == neighbor)?;
                    return Some(path[cycle_start..].to_vec());
                }
            }
        }

        path.pop();
        rec_stack.remove(&transaction);
        None
    }
}
