//! Приёмники записей журнала предзаписи

use crate::common::Result;
use crate::logging::log_record::LogRecord;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Внешний журнал, в который менеджер блокировок отправляет записи
pub trait LogSink: Send {
    fn append(&mut self, record: LogRecord) -> Result<()>;
}

/// Журнал в памяти; клоны разделяют одно хранилище
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Копия накопленных записей
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&mut self, record: LogRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Журнал в формате JSON Lines: одна запись на строку
pub struct JsonLinesLogSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesLogSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> LogSink for JsonLinesLogSink<W> {
    fn append(&mut self, record: LogRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
