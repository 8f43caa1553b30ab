//! Universe discovery via `/api/v3/exchangeInfo`.
//!
//! Keeps symbols whose `quoteAsset` matches and whose `status` is `TRADING`,
//! sorted. The whole request is retried with exponential backoff because
//! startup has nothing better to do while the exchange is unreachable.

use super::BinanceClient;
use crate::domain::error::{FetchError, ScannerError};
use crate::ports::universe_port::{UniversePort, MAX_LOAD_ATTEMPTS};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    quote_asset: String,
    status: String,
}

pub struct BinanceUniverseAdapter {
    client: Arc<BinanceClient>,
    max_retries: u32,
    base_backoff: Duration,
}

impl BinanceUniverseAdapter {
    pub fn new(client: Arc<BinanceClient>, max_retries: u32) -> Self {
        Self {
            client,
            max_retries: max_retries.clamp(1, MAX_LOAD_ATTEMPTS),
            base_backoff: Duration::from_secs(1),
        }
    }

    /// Backoff unit; attempt `n` waits `base * 2^n`.
    pub fn with_base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }
}

#[async_trait]
impl UniversePort for BinanceUniverseAdapter {
    async fn load_symbols(&self, quote: &str) -> Result<Vec<String>, ScannerError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self
                .client
                .get_with_fallback(EXCHANGE_INFO_PATH, &[], |body| filter_symbols(body, quote))
                .await
            {
                Ok(symbols) => {
                    tracing::info!(count = symbols.len(), quote, "loaded universe");
                    return Ok(symbols);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "exchangeInfo failed; retrying");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let backoff = self.base_backoff.saturating_mul(2u32.saturating_pow(attempt));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(ScannerError::UniverseLoad {
            reason: match last_error {
                Some(e) => format!("exchangeInfo failed after {} attempts: {}", self.max_retries, e),
                None => "exchangeInfo not attempted".to_string(),
            },
        })
    }
}

pub fn filter_symbols(body: Value, quote: &str) -> Result<Vec<String>, FetchError> {
    let info: ExchangeInfo = serde_json::from_value(body).map_err(|e| FetchError::Endpoint {
        endpoint: "exchangeInfo".to_string(),
        reason: format!("malformed payload: {}", e),
    })?;
    let quote = quote.to_uppercase();

    let mut symbols: Vec<String> = info
        .symbols
        .into_iter()
        .filter(|s| s.quote_asset == quote && s.status == "TRADING")
        .map(|s| s.symbol)
        .collect();
    symbols.sort();
    symbols.dedup();
    Ok(symbols)
}
