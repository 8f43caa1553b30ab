//! Configuration validation.
//!
//! Runs before anything touches the network; every failure is a fatal
//! startup error. A numeric key that is present but does not parse is an
//! error, never a silent fallback to the default.

use crate::domain::alert::{FailedCycles, QuietCycles};
use crate::domain::candle::Timeframe;
use crate::domain::cross::CrossPolicy;
use crate::domain::error::ScannerError;
use crate::domain::scan::{
    DEFAULT_CONCURRENCY, DEFAULT_EMA_PERIOD, DEFAULT_HISTORY, DEFAULT_SAFETY_BUFFER_SECS,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MAX_CANDLES_PER_REQUEST;
use crate::ports::universe_port::MAX_LOAD_ATTEMPTS;

pub const MAX_CONCURRENCY: i64 = 256;
pub const MAX_TIMEOUT_SECS: f64 = 300.0;

const MAX_HISTORY: i64 = MAX_CANDLES_PER_REQUEST as i64;
/// Largest period that still leaves room for two evaluable candles.
const MAX_EMA_PERIOD: i64 = MAX_HISTORY - 2;

pub fn validate_scanner_config(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    validate_timeframe(config)?;
    validate_period_and_history(config)?;
    validate_concurrency(config)?;
    validate_safety_buffer(config)?;
    validate_policies(config)?;
    validate_universe(config)?;
    validate_binance(config)?;
    Ok(())
}

/// Destination credentials are required unless delivery is local by choice.
pub fn validate_credentials(config: &dyn ConfigPort) -> Result<(String, String), ScannerError> {
    let token = non_blank(config.get_string("telegram", "bot_token"))
        .ok_or_else(|| ScannerError::missing("telegram", "bot_token"))?;
    let chat_id = non_blank(config.get_string("telegram", "chat_id"))
        .ok_or_else(|| ScannerError::missing("telegram", "chat_id"))?;
    Ok((token, chat_id))
}

/// Integer value of `[section] key`, or `default` when absent.
pub fn int_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, ScannerError> {
    config
        .try_get_int(section, key)
        .map(|v| v.unwrap_or(default))
        .map_err(|raw| ScannerError::invalid(section, key, format!("{:?} is not an integer", raw)))
}

pub fn double_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ScannerError> {
    config
        .try_get_double(section, key)
        .map(|v| v.unwrap_or(default))
        .map_err(|raw| ScannerError::invalid(section, key, format!("{:?} is not a number", raw)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    if let Some(tf) = config.get_string("scanner", "timeframe") {
        tf.parse::<Timeframe>()
            .map_err(|e| ScannerError::invalid("scanner", "timeframe", e.to_string()))?;
    }
    Ok(())
}

fn validate_period_and_history(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let period = int_or(config, "scanner", "ema_period", DEFAULT_EMA_PERIOD as i64)?;
    if !(1..=MAX_EMA_PERIOD).contains(&period) {
        return Err(ScannerError::invalid(
            "scanner",
            "ema_period",
            format!("ema_period must be between 1 and {}", MAX_EMA_PERIOD),
        ));
    }
    let default_history = (DEFAULT_HISTORY as i64).max(period + 2);
    let history = int_or(config, "scanner", "history", default_history)?;
    if history < period + 2 {
        return Err(ScannerError::invalid(
            "scanner",
            "history",
            format!("history must be at least ema_period + 2 ({})", period + 2),
        ));
    }
    if history > MAX_HISTORY {
        return Err(ScannerError::invalid(
            "scanner",
            "history",
            format!("history must not exceed {}", MAX_HISTORY),
        ));
    }
    Ok(())
}

fn validate_concurrency(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let value = int_or(config, "scanner", "concurrency", DEFAULT_CONCURRENCY as i64)?;
    if !(1..=MAX_CONCURRENCY).contains(&value) {
        return Err(ScannerError::invalid(
            "scanner",
            "concurrency",
            format!("concurrency must be between 1 and {}", MAX_CONCURRENCY),
        ));
    }
    Ok(())
}

fn validate_safety_buffer(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let value = int_or(config, "scanner", "safety_buffer_secs", DEFAULT_SAFETY_BUFFER_SECS)?;
    if value <= 0 {
        return Err(ScannerError::invalid(
            "scanner",
            "safety_buffer_secs",
            "safety_buffer_secs must be positive",
        ));
    }
    Ok(())
}

fn validate_policies(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    if let Some(v) = config.get_string("scanner", "policy") {
        v.parse::<CrossPolicy>()
            .map_err(|e| ScannerError::invalid("scanner", "policy", e.to_string()))?;
    }
    if let Some(v) = config.get_string("scanner", "quiet_cycles") {
        v.parse::<QuietCycles>()
            .map_err(|e| ScannerError::invalid("scanner", "quiet_cycles", e.to_string()))?;
    }
    if let Some(v) = config.get_string("scanner", "failed_cycles") {
        v.parse::<FailedCycles>()
            .map_err(|e| ScannerError::invalid("scanner", "failed_cycles", e.to_string()))?;
    }
    Ok(())
}

fn validate_universe(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let source = config
        .get_string("universe", "source")
        .unwrap_or_else(|| "binance".to_string());
    match source.trim().to_lowercase().as_str() {
        "binance" => {}
        "static" => {
            if non_blank(config.get_string("universe", "symbols")).is_none() {
                return Err(ScannerError::missing("universe", "symbols"));
            }
        }
        other => {
            return Err(ScannerError::invalid(
                "universe",
                "source",
                format!("unknown source {} (expected binance or static)", other),
            ))
        }
    }
    if let Some(quote) = config.get_string("universe", "quote_asset") {
        if quote.trim().is_empty() || !quote.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ScannerError::invalid(
                "universe",
                "quote_asset",
                "quote_asset must be a non-empty alphanumeric asset code",
            ));
        }
    }
    let retries = int_or(config, "universe", "max_retries", 5)?;
    if !(1..=MAX_LOAD_ATTEMPTS as i64).contains(&retries) {
        return Err(ScannerError::invalid(
            "universe",
            "max_retries",
            format!("max_retries must be between 1 and {}", MAX_LOAD_ATTEMPTS),
        ));
    }
    Ok(())
}

fn validate_binance(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    for endpoint in config.get_list("binance", "endpoints") {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ScannerError::invalid(
                "binance",
                "endpoints",
                format!("{} is not an http(s) URL", endpoint),
            ));
        }
    }
    let timeout = double_or(config, "binance", "timeout_secs", 10.0)?;
    if !(timeout > 0.0 && timeout <= MAX_TIMEOUT_SECS) {
        return Err(ScannerError::invalid(
            "binance",
            "timeout_secs",
            format!("timeout_secs must be in (0, {}]", MAX_TIMEOUT_SECS),
        ));
    }
    Ok(())
}
