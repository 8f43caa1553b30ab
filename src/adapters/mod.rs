//! Concrete adapter implementations for ports.

pub mod binance;
pub mod file_config_adapter;
pub mod static_universe;
pub mod stdout_notifier;
pub mod system_clock;
pub mod telegram_notifier;
