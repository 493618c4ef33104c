//! Инициализация диагностического логирования

use crate::common::config::LoggingConfig;
use env_logger::Env;

/// Инициализирует env_logger с уровнем из конфигурации.
///
/// `RUST_LOG`, если задана, имеет приоритет. Повторный вызов ничего не делает
/// и возвращает `false`.
pub fn init_logging(config: &LoggingConfig) -> bool {
    env_logger::Builder::from_env(Env::default().default_filter_or(config.level.as_str()))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
