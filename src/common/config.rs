//! Конфигурация менеджера блокировок
//!
//! Загружается из TOML файла или переменных окружения.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Что происходит с транзакцией, которую "ранила" более старая транзакция
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WoundPolicy {
    /// Блокировки жертвы снимаются, её записи возвращаются в начало очереди
    /// ожидания и повторяются автоматически
    #[default]
    Requeue,
    /// Жертва завершается как отменённая, на все её дальнейшие запросы
    /// отвечаем статусом `abort`
    Abort,
}

impl FromStr for WoundPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requeue" => Ok(WoundPolicy::Requeue),
            "abort" => Ok(WoundPolicy::Abort),
            other => Err(Error::configuration(format!(
                "unknown wound policy '{}', expected 'requeue' or 'abort'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for WoundPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WoundPolicy::Requeue => write!(f, "requeue"),
            WoundPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Конфигурация логирования
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень логирования (синтаксис фильтров env_logger)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Конфигурация менеджера блокировок
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockManagerConfig {
    /// Поведение при wound-wait откате
    pub wound_policy: WoundPolicy,
    /// Проверять ацикличность графа ожидания после каждой операции
    pub verify_acyclicity: bool,
    /// Логирование
    pub logging: LoggingConfig,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            wound_policy: WoundPolicy::Requeue,
            verify_acyclicity: cfg!(debug_assertions),
            logging: LoggingConfig::default(),
        }
    }
}

impl LockManagerConfig {
    /// Загружает конфигурацию из TOML файла
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LockManagerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Сохраняет конфигурацию в TOML файл
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Загружает конфигурацию из переменных окружения
    pub fn from_env() -> Result<Self> {
        let mut config = LockManagerConfig::default();

        if let Ok(policy) = std::env::var("RUSTDB_LOCK_WOUND_POLICY") {
            config.wound_policy = policy.parse()?;
        }

        if let Ok(verify) = std::env::var("RUSTDB_LOCK_VERIFY_ACYCLICITY") {
            config.verify_acyclicity = verify.trim().parse().map_err(|_| {
                Error::configuration(format!(
                    "RUSTDB_LOCK_VERIFY_ACYCLICITY must be 'true' or 'false', got '{}'",
                    verify
                ))
            })?;
        }

        if let Ok(level) = std::env::var("RUSTDB_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            return Err(Error::configuration("log level cannot be empty"));
        }
        Ok(())
    }
}
