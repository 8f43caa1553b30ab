//! Core domain types and logic.

pub mod alert;
pub mod candle;
pub mod config_validation;
pub mod cross;
pub mod error;
pub mod indicator;
pub mod relation_store;
pub mod scan;
pub mod scheduler;
pub mod universe;
