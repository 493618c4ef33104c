//! Очередь отложенных запросов
//!
//! Запросы, которые нельзя удовлетворить сразу, хранятся в порядке
//! поступления и повторяются при завершении транзакций. Каждый элемент
//! получает порядковый номер, чтобы проход по очереди посещал его не более
//! одного раза, даже если во время прохода очередь меняется.

use crate::core::transaction::{TransactionAction, TransactionId};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Отложенный запрос
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    pub seq: u64,
    pub action: TransactionAction,
}

/// Очередь ожидания
#[derive(Debug, Default, Clone)]
pub struct WaitingQueue {
    requests: VecDeque<QueuedRequest>,
    next_seq: u64,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn wrap(&mut self, action: TransactionAction) -> QueuedRequest {
        let seq = self.next_seq;
        self.next_seq += 1;
        QueuedRequest { seq, action }
    }

    /// Добавляет запрос в конец очереди
    pub fn push_back(&mut self, action: TransactionAction) {
        let request = self.wrap(action);
        self.requests.push_back(request);
    }

    /// Ставит запросы в начало очереди, сохраняя их взаимный порядок
    pub fn push_front_all(&mut self, actions: Vec<TransactionAction>) {
        let wrapped: Vec<_> = actions.into_iter().map(|a| self.wrap(a)).collect();
        for request in wrapped.into_iter().rev() {
            self.requests.push_front(request);
        }
    }

    /// Позиция первого запроса, который ещё не посещён и чья транзакция
    /// не заблокирована
    pub fn first_eligible(
        &self,
        visited: &HashSet<u64>,
        blocked: &BTreeSet<TransactionId>,
    ) -> Option<usize> {
        self.requests.iter().position(|request| {
            !visited.contains(&request.seq) && !blocked.contains(&request.action.transaction_id)
        })
    }

    pub fn remove(&mut self, index: usize) -> Option<QueuedRequest> {
        self.requests.remove(index)
    }

    /// Номера запросов, стоящих после позиции `index`
    pub fn seqs_after(&self, index: usize) -> HashSet<u64> {
        self.requests
            .iter()
            .skip(index + 1)
            .map(|request| request.seq)
            .collect()
    }

    /// Возвращает запрос перед первым сохранившимся из `followers`
    /// (или в конец, если таких не осталось).
    ///
    /// Запросы, добавленные в начало очереди за время повтора, остаются
    /// перед ним, а взаимный порядок прежних запросов не меняется.
    pub fn reinsert_before(&mut self, followers: &HashSet<u64>, request: QueuedRequest) {
        match self
            .requests
            .iter()
            .position(|queued| followers.contains(&queued.seq))
        {
            Some(index) => self.requests.insert(index, request),
            None => self.requests.push_back(request),
        }
    }

    /// Удаляет все запросы транзакции и возвращает их количество
    pub fn remove_transaction(&mut self, transaction_id: TransactionId) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|request| request.action.transaction_id != transaction_id);
        before - self.requests.len()
    }

    pub fn contains_transaction(&self, transaction_id: TransactionId) -> bool {
        self.requests
            .iter()
            .any(|request| request.action.transaction_id == transaction_id)
    }

    /// Отложенные действия в порядке очереди
    pub fn iter(&self) -> impl Iterator<Item = &TransactionAction> {
        self.requests.iter().map(|request| &request.action)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
