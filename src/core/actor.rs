//! Менеджер блокировок как однопоточный актор
//!
//! Задача tokio владеет [`LockManager`] и обрабатывает команды из канала
//! строго по очереди.

use crate::common::{Error, Result};
use crate::core::lock_manager::{LockManager, LockManagerStats};
use crate::core::transaction::{Response, TransactionAction, TransactionId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Размер очереди команд актора
const COMMAND_BUFFER: usize = 256;

enum Command {
    Begin {
        reply: oneshot::Sender<Result<TransactionId>>,
    },
    Validate {
        action: TransactionAction,
        reply: oneshot::Sender<Result<Response>>,
    },
    Statistics {
        reply: oneshot::Sender<LockManagerStats>,
    },
    CheckInvariants {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Клиентская сторона актора; клоны обращаются к одному менеджеру
#[derive(Clone)]
pub struct LockManagerHandle {
    sender: mpsc::Sender<Command>,
}

impl LockManagerHandle {
    /// Запускает актор в текущем рантайме tokio.
    ///
    /// `JoinHandle` возвращает менеджер после `shutdown` или когда все
    /// клоны дескриптора уничтожены.
    pub fn spawn(manager: LockManager) -> (Self, JoinHandle<LockManager>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run(manager, receiver));
        (Self { sender }, task)
    }

    pub async fn begin_transaction(&self) -> Result<TransactionId> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Begin { reply }).await?;
        response.await.map_err(|_| stopped())?
    }

    pub async fn validate_object(&self, action: TransactionAction) -> Result<Response> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Validate { action, reply }).await?;
        response.await.map_err(|_| stopped())?
    }

    pub async fn statistics(&self) -> Result<LockManagerStats> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Statistics { reply }).await?;
        response.await.map_err(|_| stopped())
    }

    pub async fn check_invariants(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::CheckInvariants { reply }).await?;
        response.await.map_err(|_| stopped())?
    }

    /// Останавливает актор после уже поставленных команд
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.sender.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> Error {
    Error::internal("lock manager actor has stopped")
}

async fn run(mut manager: LockManager, mut receiver: mpsc::Receiver<Command>) -> LockManager {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Begin { reply } => {
                let _ = reply.send(manager.begin_transaction());
            }
            Command::Validate { action, reply } => {
                let _ = reply.send(manager.validate_object(action));
            }
            Command::Statistics { reply } => {
                let _ = reply.send(manager.statistics());
            }
            Command::CheckInvariants { reply } => {
                let _ = reply.send(manager.check_invariants());
            }
            Command::Shutdown => break,
        }
    }
    log::debug!("Актор менеджера блокировок остановлен");
    manager
}
