//! Market data access port.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Most candles a single request may return.
pub const MAX_CANDLES_PER_REQUEST: usize = 1000;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Up to `limit` most recent candles opened no later than `end_time`,
    /// oldest first. Upstream may repeat a close time; callers normalise.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Candle>, FetchError>;
}
