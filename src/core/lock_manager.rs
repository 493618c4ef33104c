//! Менеджер иерархических блокировок
//!
//! Реализует протокол намерений (intention locking) по иерархии
//! База данных → Таблица → Строка → Ячейка, разрешение конфликтов по схеме
//! wound-wait и повтор отложенных запросов при завершении транзакций.
//!
//! Менеджер никогда не блокирует вызывающий поток: запрос, который нельзя
//! удовлетворить, возвращает статус `wait` и попадает в очередь ожидания,
//! откуда повторяется в [`LockManager::process_waiting_list`].

use crate::common::{Error, LockManagerConfig, Result, WoundPolicy};
use crate::core::data_item::DataItem;
use crate::core::lock::{LockMode, LockTable};
use crate::core::transaction::{
    ActionKind, Response, ResponseStatus, TransactionAction, TransactionId, TransactionRegistry,
};
use crate::core::wait_for_graph::WaitForGraph;
use crate::core::waiting_queue::WaitingQueue;
use crate::logging::{LogRecord, LogRecordType, LogSequenceNumber, LogSink, MemoryLogSink};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Статистика менеджера блокировок
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockManagerStats {
    /// Общее количество запросов блокировок
    pub total_lock_requests: u64,
    /// Количество выданных блокировок (включая блокировки предков)
    pub locks_granted: u64,
    /// Количество повышений режима
    pub lock_upgrades: u64,
    /// Количество запросов, ушедших в ожидание
    pub waits: u64,
    /// Количество "раненых" транзакций
    pub wounds: u64,
    /// Количество повторов из очереди ожидания
    pub replays: u64,
    /// Количество зафиксированных транзакций
    pub commits: u64,
    /// Количество отменённых транзакций
    pub aborts: u64,
}

/// Результат [`LockManager::apply_lock`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDecision {
    /// Блокировка на целевом объекте получена
    pub allowed: bool,
    /// Запрашивающая транзакция принудительно отменена
    pub forced_abort: bool,
    /// Транзакции, "раненые" этим запросом
    pub wounded: Vec<TransactionId>,
    pub message: String,
}

impl LockDecision {
    fn granted(wounded: Vec<TransactionId>, message: String) -> Self {
        Self {
            allowed: true,
            forced_abort: false,
            wounded,
            message,
        }
    }

    fn denied(wounded: Vec<TransactionId>, message: String) -> Self {
        Self {
            allowed: false,
            forced_abort: false,
            wounded,
            message,
        }
    }

    fn aborted(message: String) -> Self {
        Self {
            allowed: false,
            forced_abort: true,
            wounded: Vec::new(),
            message,
        }
    }
}

/// Обеспечивает ли удерживаемый режим запрошенный без изменения состояния.
///
/// Помимо матрицы поглощения требуем, чтобы удерживаемый режим был не
/// слабее их супремума: IX формально поглощает S, но не даёт права чтения.
fn covers(held: LockMode, requested: LockMode) -> bool {
    requested.is_satisfied_by(held) && held.supremum(requested) == held
}

/// Менеджер блокировок
pub struct LockManager {
    /// Конфигурация
    config: LockManagerConfig,
    /// Счетчик для генерации ID транзакций
    next_transaction_id: u64,
    /// Держатели блокировок по режимам
    lock_table: LockTable,
    /// Удерживаемые режимы и журнал действий
    registry: TransactionRegistry,
    /// Граф ожидания
    wait_for_graph: WaitForGraph,
    /// Транзакции, которым запрещено выполнять новые запросы
    blocked: BTreeSet<TransactionId>,
    /// Отложенные запросы
    waiting_queue: WaitingQueue,
    /// Транзакции, завершённые откатом при `WoundPolicy::Abort`.
    ///
    /// Хранятся всё время жизни менеджера: id не переиспользуются, и любой
    /// поздний запрос такой транзакции должен получить `abort`, а не ошибку.
    wounded: HashSet<TransactionId>,
    /// Внешний журнал предзаписи
    sink: Box<dyn LogSink>,
    next_lsn: LogSequenceNumber,
    /// Статистика
    stats: LockManagerStats,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("config", &self.config)
            .field("next_transaction_id", &self.next_transaction_id)
            .field("locks", &self.lock_table.len())
            .field("blocked", &self.blocked)
            .field("waiting", &self.waiting_queue.len())
            .finish()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockManagerConfig::default())
    }
}

impl LockManager {
    /// Создает менеджер, пишущий журнал в память
    pub fn new(config: LockManagerConfig) -> Self {
        Self::with_sink(config, Box::new(MemoryLogSink::new()))
    }

    /// Создает менеджер с заданным приёмником журнала предзаписи
    pub fn with_sink(config: LockManagerConfig, sink: Box<dyn LogSink>) -> Self {
        Self {
            config,
            next_transaction_id: 1,
            lock_table: LockTable::new(),
            registry: TransactionRegistry::new(),
            wait_for_graph: WaitForGraph::new(),
            blocked: BTreeSet::new(),
            waiting_queue: WaitingQueue::new(),
            wounded: HashSet::new(),
            sink,
            next_lsn: 1,
            stats: LockManagerStats::default(),
        }
    }

    /// Начинает новую транзакцию
    pub fn begin_transaction(&mut self) -> Result<TransactionId> {
        let transaction_id = TransactionId(self.next_transaction_id);
        self.next_transaction_id += 1;

        self.registry.register(transaction_id);
        self.validate(TransactionAction::start(transaction_id), false)?;

        log::debug!("Начата транзакция {}", transaction_id);
        Ok(transaction_id)
    }

    /// Обрабатывает запрос транзакции
    pub fn validate_object(&mut self, action: TransactionAction) -> Result<Response> {
        let response = self.validate(action, false)?;
        self.verify_acyclicity();
        Ok(response)
    }

    fn validate(&mut self, action: TransactionAction, replay: bool) -> Result<Response> {
        let transaction_id = action.transaction_id;

        if action.kind == ActionKind::Start {
            self.append_log(&action)?;
            return Ok(Response::success(transaction_id, "transaction started"));
        }

        if !action.kind.is_terminal() {
            requested_lock(&action)?;
        }

        if self.blocked.contains(&transaction_id) {
            if !replay {
                log::debug!("{} заблокирована, запрос отложен: {}", transaction_id, action);
                self.waiting_queue.push_back(action);
            }
            return Ok(Response::wait(
                transaction_id,
                format!("{} is blocked and must wait", transaction_id),
            ));
        }

        if self.wounded.contains(&transaction_id) {
            return Ok(Response::abort(
                transaction_id,
                format!("{} was rolled back by an older transaction", transaction_id),
            ));
        }

        if !self.registry.is_active(transaction_id) {
            return Err(Error::transaction(format!(
                "{} is not an active transaction",
                transaction_id
            )));
        }

        if action.kind.is_terminal() {
            self.end_transaction(transaction_id, action.kind)?;
            return Ok(Response::success(
                transaction_id,
                format!("{} finished with {}", transaction_id, action.kind),
            ));
        }

        let decision = self.apply_lock(&action)?;

        if decision.forced_abort {
            return Ok(Response::abort(transaction_id, decision.message));
        }

        if !decision.allowed {
            if !replay {
                self.waiting_queue.push_back(action);
            }
            return Ok(Response::wait(transaction_id, decision.message));
        }

        if action.kind == ActionKind::Write {
            self.append_log(&action)?;
        }
        Ok(Response::success(transaction_id, decision.message))
    }

    /// Получает блокировку на объект и намерения на всех его предков.
    ///
    /// Предки обрабатываются от корня к объекту; блокировки, полученные на
    /// предках, остаются даже если на самом объекте приходится ждать.
    pub fn apply_lock(&mut self, action: &TransactionAction) -> Result<LockDecision> {
        let transaction_id = action.transaction_id;
        let (requested, item) = requested_lock(action)?;

        if self.wounded.contains(&transaction_id) {
            return Ok(LockDecision::aborted(format!(
                "{} was rolled back by an older transaction",
                transaction_id
            )));
        }
        if !self.registry.is_active(transaction_id) {
            return Err(Error::transaction(format!(
                "{} is not an active transaction",
                transaction_id
            )));
        }

        self.stats.total_lock_requests += 1;

        let path = item.path_from_root();
        let leaf = path.len() - 1;
        let mut wounded_total = Vec::new();

        for (depth, node) in path.iter().enumerate() {
            let effective = if depth == leaf {
                requested
            } else {
                requested.intention()
            };

            loop {
                let held = self.registry.mode(transaction_id, node);
                if held == Some(effective) || held.is_some_and(|h| covers(h, effective)) {
                    break;
                }

                let target = held.map_or(effective, |h| h.supremum(effective));
                let conflicts = self
                    .lock_table
                    .conflicting_holders(node, target, transaction_id);

                if conflicts.is_empty() {
                    self.grant(transaction_id, node, held, target);
                    break;
                }

                let (older, younger): (Vec<_>, Vec<_>) = conflicts
                    .into_iter()
                    .partition(|holder| holder.is_older_than(transaction_id));

                if !older.is_empty() {
                    for &holder in &older {
                        self.wait_for_graph.add_edge(transaction_id, holder);
                    }
                    self.blocked.insert(transaction_id);
                    self.stats.waits += 1;
                    log::debug!(
                        "{} ждёт {:?} для {} на {}",
                        transaction_id,
                        older,
                        target,
                        node
                    );
                    return Ok(LockDecision::denied(
                        wounded_total,
                        format!(
                            "{} must wait for {} on {}",
                            transaction_id,
                            format_ids(&older),
                            node
                        ),
                    ));
                }

                self.wound(transaction_id, &younger)?;
                wounded_total.extend(younger);
            }
        }

        let message = if wounded_total.is_empty() {
            format!("{} granted {} on {}", transaction_id, requested, item)
        } else {
            format!(
                "{} granted {} on {} after rolling back {}",
                transaction_id,
                requested,
                item,
                format_ids(&wounded_total)
            )
        };
        Ok(LockDecision::granted(wounded_total, message))
    }

    /// Выдаёт или повышает блокировку транзакции на узле
    fn grant(
        &mut self,
        transaction_id: TransactionId,
        node: &DataItem,
        held: Option<LockMode>,
        target: LockMode,
    ) {
        if let Some(previous) = held {
            self.lock_table.remove(node, previous, transaction_id);
            self.stats.lock_upgrades += 1;
            log::debug!(
                "{}: повышение {} -> {} на {}",
                transaction_id,
                previous,
                target,
                node
            );
        }
        self.lock_table.insert(node, target, transaction_id);
        self.registry.set_mode(transaction_id, node, target);
        self.stats.locks_granted += 1;
    }

    /// "Ранит" более молодых держателей конфликтующих блокировок
    fn wound(&mut self, requester: TransactionId, victims: &[TransactionId]) -> Result<()> {
        log::warn!("{} откатывает транзакции {:?}", requester, victims);
        self.stats.wounds += victims.len() as u64;

        for &victim in victims {
            self.wait_for_graph.delete_node(victim);
        }

        let in_flight = self.rollback(victims)?;

        match self.config.wound_policy {
            WoundPolicy::Requeue => {
                for &victim in victims {
                    // Жертва не повторяется раньше, чем завершится вытеснившая её транзакция
                    self.wait_for_graph.add_edge(victim, requester);
                    self.blocked.insert(victim);
                }
                self.waiting_queue.push_front_all(in_flight);
            }
            WoundPolicy::Abort => {
                for &victim in victims {
                    self.registry.remove(victim);
                    self.blocked.remove(&victim);
                    self.waiting_queue.remove_transaction(victim);
                    self.wounded.insert(victim);
                    self.append_log(&TransactionAction::abort(victim))?;
                    self.stats.aborts += 1;
                }
            }
        }
        Ok(())
    }

    /// Снимает все блокировки транзакций и удаляет их записи из журнала.
    ///
    /// Возвращает незавершённые действия транзакций в исходном порядке.
    pub fn rollback(&mut self, victims: &[TransactionId]) -> Result<Vec<TransactionAction>> {
        let mut in_flight = Vec::new();
        for &victim in victims {
            let locks = self.registry.take_locks(victim);
            let released = self.lock_table.release_all(victim);
            debug_assert_eq!(
                released,
                locks.len(),
                "{} lock table and registry disagree",
                victim
            );

            in_flight.extend(self.registry.remove_log_entries(victim));
            self.emit(LogRecord::lifecycle(
                self.next_lsn,
                victim,
                LogRecordType::TransactionRollback,
            ))?;
            log::info!("Откат {}: снято блокировок {}", victim, locks.len());
        }
        Ok(in_flight)
    }

    /// Завершает транзакцию фиксацией или отменой
    pub fn end_transaction(
        &mut self,
        transaction_id: TransactionId,
        status: ActionKind,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::validation(format!(
                "'{}' does not end a transaction",
                status
            )));
        }
        let locks = self.registry.remove(transaction_id).ok_or_else(|| {
            Error::transaction(format!("{} is not an active transaction", transaction_id))
        })?;

        let released = self.lock_table.release_all(transaction_id);
        debug_assert_eq!(
            released,
            locks.len(),
            "{} lock table and registry disagree",
            transaction_id
        );
        self.blocked.remove(&transaction_id);
        self.wait_for_graph.delete_node(transaction_id);

        let dropped = self.waiting_queue.remove_transaction(transaction_id);
        if dropped > 0 {
            log::warn!(
                "{} завершена с {} отложенными запросами, они отброшены",
                transaction_id,
                dropped
            );
        }

        let terminal = match status {
            ActionKind::Commit => {
                self.stats.commits += 1;
                TransactionAction::commit(transaction_id)
            }
            _ => {
                self.stats.aborts += 1;
                TransactionAction::abort(transaction_id)
            }
        };
        self.append_log(&terminal)?;
        log::info!(
            "{} завершена ({}), снято блокировок {}",
            transaction_id,
            status,
            locks.len()
        );

        // Транзакция уже завершена; неудачный повтор остался в очереди
        if let Err(err) = self.process_waiting_list() {
            log::error!(
                "{} завершена, но повтор очереди прерван: {}",
                transaction_id,
                err
            );
        }
        Ok(())
    }

    /// Повторяет отложенные запросы транзакций, которые больше не ждут.
    ///
    /// Запрос, который снова должен ждать или повтор которого завершился
    /// ошибкой, возвращается на своё место относительно остальных запросов.
    /// Проход продолжается; возвращается первая ошибка.
    pub fn process_waiting_list(&mut self) -> Result<()> {
        let graph = &self.wait_for_graph;
        self.blocked.retain(|&tid| graph.is_waiting(tid));

        let mut visited = HashSet::new();
        let mut first_error = None;
        while let Some(index) = self.waiting_queue.first_eligible(&visited, &self.blocked) {
            let followers = self.waiting_queue.seqs_after(index);
            let Some(request) = self.waiting_queue.remove(index) else {
                break;
            };
            visited.insert(request.seq);
            self.stats.replays += 1;

            let terminal = request.action.kind.is_terminal();
            log::debug!("Повтор отложенного запроса: {}", request.action);

            match self.validate(request.action.clone(), true) {
                // Завершение транзакции уже запустило собственный проход по очереди
                Ok(_) if terminal => break,
                Ok(response) => {
                    if response.status == ResponseStatus::Wait {
                        self.waiting_queue.reinsert_before(&followers, request);
                    }
                }
                Err(err) => {
                    log::error!("Повтор {} не удался: {}", request.action, err);
                    if self.registry.is_active(request.action.transaction_id) {
                        self.waiting_queue.reinsert_before(&followers, request);
                    }
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Добавляет действие в журнал и отправляет запись во внешний журнал
    fn append_log(&mut self, action: &TransactionAction) -> Result<()> {
        if let Some(record) = LogRecord::for_action(self.next_lsn, action) {
            self.emit(record)?;
        }
        self.registry.append_log(action.clone());
        Ok(())
    }

    fn emit(&mut self, record: LogRecord) -> Result<()> {
        self.next_lsn += 1;
        self.sink.append(record)
    }

    fn verify_acyclicity(&self) {
        if self.config.verify_acyclicity {
            if let Some(cycle) = self.wait_for_graph.find_cycle() {
                panic!("wait-for graph contains a cycle: {:?}", cycle);
            }
        }
    }

    /// Проверяет согласованность состояния менеджера
    pub fn check_invariants(&self) -> Result<()> {
        let entries = self.lock_table.entries();

        // Взаимное исключение: никакие два держателя не конфликтуют
        for (i, (item, mode, tid)) in entries.iter().enumerate() {
            for (other_item, other_mode, other_tid) in &entries[i + 1..] {
                if item == other_item && tid != other_tid && mode.conflicts_with(*other_mode) {
                    return Err(Error::internal(format!(
                        "{} holds {} and {} holds {} on {}",
                        tid, mode, other_tid, other_mode, item
                    )));
                }
            }
        }

        // Таблица и реестр описывают одни и те же блокировки
        let mut registered = 0;
        for tid in self.registry.active_ids() {
            for (item, mode) in self.registry.locks(tid) {
                registered += 1;
                if !self.lock_table.is_held_by(&item, mode, tid) {
                    return Err(Error::internal(format!(
                        "{} records {} on {} but the lock table does not",
                        tid, mode, item
                    )));
                }
                // Намерения на всех предках
                let intention = mode.intention();
                let mut ancestor = item.parent();
                while let Some(node) = ancestor {
                    let ok = self
                        .registry
                        .mode(tid, &node)
                        .is_some_and(|held| held == intention || covers(held, intention));
                    if !ok {
                        return Err(Error::internal(format!(
                            "{} holds {} on {} without {} on {}",
                            tid, mode, item, intention, node
                        )));
                    }
                    ancestor = node.parent();
                }
            }
        }
        if registered != entries.len() {
            return Err(Error::internal(format!(
                "lock table has {} entries, registry has {}",
                entries.len(),
                registered
            )));
        }

        if let Some(cycle) = self.wait_for_graph.find_cycle() {
            return Err(Error::internal(format!(
                "wait-for graph contains a cycle: {:?}",
                cycle
            )));
        }
        Ok(())
    }

    /// Получает конфигурацию менеджера
    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Получает статистику менеджера блокировок
    pub fn statistics(&self) -> LockManagerStats {
        self.stats.clone()
    }

    /// Держатели режима на объекте
    pub fn holders(&self, item: &DataItem, mode: LockMode) -> Vec<TransactionId> {
        self.lock_table.holders(item, mode)
    }

    /// Режим, который транзакция удерживает на объекте
    pub fn held_mode(&self, transaction_id: TransactionId, item: &DataItem) -> Option<LockMode> {
        self.registry.mode(transaction_id, item)
    }

    /// Все блокировки транзакции
    pub fn locks_of(&self, transaction_id: TransactionId) -> BTreeMap<DataItem, LockMode> {
        self.registry.locks(transaction_id)
    }

    pub fn is_active(&self, transaction_id: TransactionId) -> bool {
        self.registry.is_active(transaction_id)
    }

    pub fn is_blocked(&self, transaction_id: TransactionId) -> bool {
        self.blocked.contains(&transaction_id)
    }

    /// Была ли транзакция завершена откатом при `WoundPolicy::Abort`
    pub fn is_wounded(&self, transaction_id: TransactionId) -> bool {
        self.wounded.contains(&transaction_id)
    }

    pub fn active_transactions(&self) -> Vec<TransactionId> {
        self.registry.active_ids()
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.lock_table
    }

    pub fn wait_for_graph(&self) -> &WaitForGraph {
        &self.wait_for_graph
    }

    /// Отложенные запросы в порядке очереди
    pub fn waiting_requests(&self) -> Vec<TransactionAction> {
        self.waiting_queue.iter().cloned().collect()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting_queue.len()
    }

    /// Журнал действий
    pub fn action_log(&self) -> &[TransactionAction] {
        self.registry.log()
    }
}

/// Режим и объект, которые требуются действию
fn requested_lock(action: &TransactionAction) -> Result<(LockMode, &DataItem)> {
    let mode = action.kind.lock_mode().ok_or_else(|| {
        Error::validation(format!("action '{}' does not take a lock", action.kind))
    })?;
    let item = action.item.as_ref().ok_or_else(|| {
        Error::validation(format!("action '{}' requires a target item", action.kind))
    })?;
    Ok((mode, item))
}

fn format_ids(ids: &[TransactionId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
