//! Интеграционные тесты rustdb-locking

pub mod common;
pub mod concurrency_tests;
pub mod config_tests;
pub mod property_tests;
pub mod scenario_tests;
