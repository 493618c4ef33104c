//! Журнал предзаписи как внешний потребитель менеджера блокировок
//!
//! Менеджер блокировок сообщает о начале транзакций, разрешённых записях,
//! фиксации, отмене и откате. Долговечность и восстановление
//! обеспечиваются за пределами этого крейта.

pub mod log_record;
pub mod sink;

pub use log_record::{LogRecord, LogRecordType, LogSequenceNumber};
pub use sink::{JsonLinesLogSink, LogSink, MemoryLogSink};
