//! Общие типы и утилиты

pub mod config;
pub mod error;
pub mod logger;

pub use config::{LockManagerConfig, LoggingConfig, WoundPolicy};
pub use error::{Error, Result};
pub use logger::init_logging;
