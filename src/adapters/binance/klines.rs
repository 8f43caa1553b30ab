//! Kline (candlestick) market data adapter.

use super::BinanceClient;
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::FetchError;
use crate::ports::market_data_port::{MarketDataPort, MAX_CANDLES_PER_REQUEST};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

const KLINES_PATH: &str = "/api/v3/klines";

const CLOSE_INDEX: usize = 4;
const CLOSE_TIME_INDEX: usize = 6;

pub struct BinanceKlineAdapter {
    client: Arc<BinanceClient>,
}

impl BinanceKlineAdapter {
    pub fn new(client: Arc<BinanceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MarketDataPort for BinanceKlineAdapter {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Candle>, FetchError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.min(MAX_CANDLES_PER_REQUEST).to_string()),
            ("endTime", end_time.timestamp_millis().to_string()),
        ];
        self.client
            .get_with_fallback(KLINES_PATH, &query, parse_klines)
            .await
    }
}

/// Parse `[[openTime, open, high, low, close, volume, closeTime, ...], ...]`.
///
/// Any malformed row rejects the whole payload so a fallback endpoint gets
/// a chance to answer.
pub fn parse_klines(body: Value) -> Result<Vec<Candle>, FetchError> {
    let rows = body.as_array().ok_or_else(|| malformed("expected an array of klines"))?;
    if rows.is_empty() {
        return Err(FetchError::EmptyResponse);
    }

    rows.iter()
        .map(|row| {
            let fields = row.as_array().ok_or_else(|| malformed("kline row is not an array"))?;
            let close = fields
                .get(CLOSE_INDEX)
                .and_then(parse_number)
                .ok_or_else(|| malformed("missing close price"))?;
            let close_ms = fields
                .get(CLOSE_TIME_INDEX)
                .and_then(Value::as_i64)
                .ok_or_else(|| malformed("missing close time"))?;
            let close_time = DateTime::<Utc>::from_timestamp_millis(close_ms)
                .ok_or_else(|| malformed("close time out of range"))?;
            if !close.is_finite() {
                return Err(malformed("non-finite close price"));
            }
            Ok(Candle::new(close, close_time))
        })
        .collect()
}

/// Prices arrive as decimal strings; accept bare numbers too.
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn malformed(reason: &str) -> FetchError {
    FetchError::Endpoint {
        endpoint: "klines".to_string(),
        reason: format!("malformed payload: {}", reason),
    }
}
