//! Scan orchestrator.
//!
//! One cycle fans fetch -> EMA -> cross detection out over the whole universe.
//! Concurrency is capped by a semaphore sized from config, independent of the
//! universe size. Every symbol settles on its own: fetch errors, short
//! histories, unclosed candles and even panics are contained in that
//! symbol's task and show up only in the cycle summary.
//!
//! `now` is supplied by the caller; nothing in here reads the wall clock.

use crate::domain::candle::{normalize_candles, Candle, Timeframe};
use crate::domain::cross::{two_point, CrossPolicy, Direction, Observation};
use crate::domain::error::ScannerError;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::relation_store::RelationStore;
use crate::domain::universe::Universe;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_EMA_PERIOD: usize = 200;
pub const DEFAULT_HISTORY: usize = 220;
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_SAFETY_BUFFER_SECS: i64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub timeframe: Timeframe,
    pub ema_period: usize,
    pub history: usize,
    pub concurrency: usize,
    pub safety_buffer: TimeDelta,
    pub policy: CrossPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::H1,
            ema_period: DEFAULT_EMA_PERIOD,
            history: DEFAULT_HISTORY,
            concurrency: DEFAULT_CONCURRENCY,
            safety_buffer: TimeDelta::seconds(DEFAULT_SAFETY_BUFFER_SECS),
            policy: CrossPolicy::TwoPoint,
        }
    }
}

impl ScanConfig {
    /// Candles required before a symbol is evaluated at all.
    pub fn min_candles(&self) -> usize {
        self.ema_period + 2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub symbol: String,
    pub direction: Direction,
    pub close: f64,
    pub indicator: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Unclosed { close_time: DateTime<Utc> },
    /// Latest closed candle is older than the previous boundary; upstream lags.
    Stale { close_time: DateTime<Utc> },
    IndicatorUndefined,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Signal(Detection),
    Quiet,
    Skipped(SkipReason),
}

/// How one symbol's task settled. Errors never leave the symbol.
pub type SymbolResult = Result<SymbolOutcome, ScannerError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub scanned: usize,
    pub signals: usize,
    pub quiet: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleSummary {
    fn record(&mut self, result: &SymbolResult) {
        self.scanned += 1;
        match result {
            Ok(SymbolOutcome::Signal(_)) => self.signals += 1,
            Ok(SymbolOutcome::Quiet) => self.quiet += 1,
            Ok(SymbolOutcome::Skipped(_)) | Err(ScannerError::InsufficientData { .. }) => {
                self.skipped += 1
            }
            Err(_) => self.failed += 1,
        }
    }

    /// Every symbol failed to fetch; not the same thing as a quiet market.
    pub fn all_failed(&self) -> bool {
        self.scanned > 0 && self.failed == self.scanned
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Detections in universe iteration order.
    pub detections: Vec<Detection>,
    pub summary: CycleSummary,
}

pub struct Scanner {
    market_data: Arc<dyn MarketDataPort>,
    store: Arc<RelationStore>,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(market_data: Arc<dyn MarketDataPort>, config: ScanConfig) -> Self {
        Self {
            market_data,
            store: Arc::new(RelationStore::new()),
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn relation_store(&self) -> &RelationStore {
        &self.store
    }

    /// Run one cycle and wait for every symbol's task to settle.
    ///
    /// Dropping the returned future aborts all in-flight tasks. A symbol's
    /// relation is written only after its decision is complete, so an abort
    /// never leaves a half-updated entry.
    pub async fn run_cycle(&self, universe: &Universe, now: DateTime<Utc>) -> CycleOutcome {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, symbol) in universe.symbols().iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let market_data = Arc::clone(&self.market_data);
            let store = Arc::clone(&self.store);
            let config = self.config.clone();
            let symbol = symbol.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => AssertUnwindSafe(scan_symbol(
                        market_data.as_ref(),
                        &store,
                        &config,
                        &symbol,
                        now,
                    ))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(task_error(&symbol, "panicked"))),
                    Err(_) => Err(task_error(&symbol, "lost its concurrency permit")),
                };
                (index, result)
            });
        }

        let mut settled: Vec<Option<SymbolResult>> =
            (0..universe.count()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => settled[index] = Some(result),
                Err(e) => tracing::warn!(error = %e, "scan task did not complete"),
            }
        }

        let mut outcome = CycleOutcome::default();
        for (symbol, result) in universe.symbols().iter().zip(settled) {
            let result = result.unwrap_or_else(|| Err(task_error(symbol, "was aborted")));
            log_result(symbol, &result);
            outcome.summary.record(&result);
            if let Ok(SymbolOutcome::Signal(detection)) = result {
                outcome.detections.push(detection);
            }
        }

        tracing::info!(
            scanned = outcome.summary.scanned,
            signals = outcome.summary.signals,
            quiet = outcome.summary.quiet,
            skipped = outcome.summary.skipped,
            failed = outcome.summary.failed,
            "scan cycle complete"
        );
        outcome
    }
}

async fn scan_symbol(
    market_data: &dyn MarketDataPort,
    store: &RelationStore,
    config: &ScanConfig,
    symbol: &str,
    now: DateTime<Utc>,
) -> SymbolResult {
    // Exclude the candle that opens exactly at the cutoff.
    let end_time = now - config.safety_buffer - TimeDelta::milliseconds(1);

    let candles = market_data
        .fetch_candles(symbol, config.timeframe, config.history, end_time)
        .await
        .map_err(|source| ScannerError::Fetch {
            symbol: symbol.to_string(),
            source,
        })?;
    evaluate(symbol, &normalize_candles(candles), config, store, now)
}

fn task_error(symbol: &str, reason: &str) -> ScannerError {
    ScannerError::ScanTask {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    }
}

/// Decide a single symbol from its (normalised) candle history.
pub fn evaluate(
    symbol: &str,
    candles: &[Candle],
    config: &ScanConfig,
    store: &RelationStore,
    now: DateTime<Utc>,
) -> SymbolResult {
    let minimum = config.min_candles();
    if candles.len() < minimum {
        return Err(ScannerError::InsufficientData {
            symbol: symbol.to_string(),
            candles: candles.len(),
            minimum,
        });
    }

    let last = candles[candles.len() - 1];
    if !last.is_closed(now, config.safety_buffer) {
        return Ok(SymbolOutcome::Skipped(SkipReason::Unclosed {
            close_time: last.close_time,
        }));
    }
    if last.close_time < now - config.timeframe.duration() - config.safety_buffer {
        return Ok(SymbolOutcome::Skipped(SkipReason::Stale {
            close_time: last.close_time,
        }));
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let series = calculate_ema(&closes, config.ema_period);
    let n = closes.len();

    let (signal, indicator) = match config.policy {
        CrossPolicy::TwoPoint => {
            let Some((prev_ema, last_ema)) = series.last_pair() else {
                return Ok(SymbolOutcome::Skipped(SkipReason::IndicatorUndefined));
            };
            let prev = Observation::new(closes[n - 2], prev_ema);
            let curr = Observation::new(closes[n - 1], last_ema);
            (two_point(prev, curr), last_ema)
        }
        CrossPolicy::RelationChange => {
            let Some(last_ema) = series.last() else {
                return Ok(SymbolOutcome::Skipped(SkipReason::IndicatorUndefined));
            };
            let curr = Observation::new(closes[n - 1], last_ema);
            (store.observe(symbol, curr.relation()), last_ema)
        }
    };

    Ok(match signal {
        Some(direction) => SymbolOutcome::Signal(Detection {
            symbol: symbol.to_string(),
            direction,
            close: last.close,
            indicator,
        }),
        None => SymbolOutcome::Quiet,
    })
}

fn log_result(symbol: &str, result: &SymbolResult) {
    match result {
        Ok(SymbolOutcome::Signal(d)) => tracing::info!(
            symbol,
            direction = %d.direction,
            close = d.close,
            indicator = d.indicator,
            "cross detected"
        ),
        Ok(SymbolOutcome::Quiet) => {}
        Ok(SymbolOutcome::Skipped(reason)) => {
            tracing::debug!(symbol, reason = ?reason, "symbol skipped")
        }
        Err(ScannerError::InsufficientData {
            candles, minimum, ..
        }) => tracing::debug!(symbol, candles, minimum, "symbol skipped: short history"),
        Err(ScannerError::Fetch { source, .. }) => tracing::warn!(
            symbol,
            kind = source.kind(),
            error = %source,
            "fetch failed"
        ),
        Err(e) => tracing::warn!(symbol, error = %e, "symbol failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fetch_timeout(symbol: &str) -> ScannerError {
        ScannerError::Fetch {
            symbol: symbol.into(),
            source: crate::domain::error::FetchError::Timeout,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()
    }

    fn config(period: usize, policy: CrossPolicy) -> ScanConfig {
        ScanConfig {
            ema_period: period,
            history: period + 5,
            policy,
            ..ScanConfig::default()
        }
    }

    /// Hourly candles whose last close lands at 11:59:59.999.
    fn hourly(closes: &[f64]) -> Vec<Candle> {
        let last_close = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            - TimeDelta::milliseconds(1);
        let n = closes.len() as i32;
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(c, last_close - TimeDelta::hours((n - 1 - i as i32) as i64)))
            .collect()
    }

    #[test]
    fn insufficient_candles_is_data_error() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::TwoPoint);
        let result = evaluate("XUSDT", &hourly(&[1.0, 2.0, 3.0, 4.0]), &cfg, &store, now());
        match result {
            Err(ScannerError::InsufficientData {
                symbol,
                candles,
                minimum,
            }) => {
                assert_eq!(symbol, "XUSDT");
                assert_eq!(candles, 4);
                assert_eq!(minimum, 5);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_candle_skip() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::TwoPoint);
        let mut candles = hourly(&[10.0, 10.0, 10.0, 9.0, 12.0]);
        candles[4].close_time = now() + TimeDelta::minutes(59);
        assert!(matches!(
            evaluate("XUSDT", &candles, &cfg, &store, now()),
            Ok(SymbolOutcome::Skipped(SkipReason::Unclosed { .. }))
        ));
    }

    #[test]
    fn lagging_history_is_stale() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::TwoPoint);
        let candles = hourly(&[10.0, 10.0, 10.0, 9.0, 12.0]);

        // Same candles one boundary later: the newest close is an hour old.
        let later = now() + TimeDelta::hours(1);
        assert!(matches!(
            evaluate("XUSDT", &candles, &cfg, &store, later),
            Ok(SymbolOutcome::Skipped(SkipReason::Stale { .. }))
        ));
        // Mid-period runs still see the last boundary's candle as current.
        let mid = now() + TimeDelta::minutes(50);
        assert!(matches!(
            evaluate("XUSDT", &candles, &cfg, &store, mid),
            Ok(SymbolOutcome::Signal(_))
        ));
    }

    #[test]
    fn two_point_bullish_cross() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::TwoPoint);
        // EMA(3): seed 10, then 9.5 at index 3 (close 9 below), then 10.75 (close 12 above)
        let outcome = evaluate("XUSDT", &hourly(&[10.0, 10.0, 10.0, 9.0, 12.0]), &cfg, &store, now());
        match outcome {
            Ok(SymbolOutcome::Signal(d)) => {
                assert_eq!(d.direction, Direction::Bullish);
                assert_eq!(d.close, 12.0);
                assert!((d.indicator - 10.75).abs() < 1e-12);
            }
            other => panic!("expected signal, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn two_point_bearish_cross() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::TwoPoint);
        let outcome = evaluate("XUSDT", &hourly(&[10.0, 10.0, 10.0, 11.0, 8.0]), &cfg, &store, now());
        assert!(matches!(
            outcome,
            Ok(SymbolOutcome::Signal(Detection { direction: Direction::Bearish, .. }))
        ));
    }

    #[test]
    fn relation_change_seeds_then_fires_once() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::RelationChange);
        let above = hourly(&[10.0, 10.0, 10.0, 11.0, 12.0]);
        let below = hourly(&[10.0, 10.0, 10.0, 9.0, 8.0]);

        assert!(matches!(evaluate("XUSDT", &above, &cfg, &store, now()), Ok(SymbolOutcome::Quiet)));
        assert!(matches!(evaluate("XUSDT", &above, &cfg, &store, now()), Ok(SymbolOutcome::Quiet)));
        assert!(matches!(
            evaluate("XUSDT", &below, &cfg, &store, now()),
            Ok(SymbolOutcome::Signal(Detection { direction: Direction::Bearish, .. }))
        ));
        assert!(matches!(evaluate("XUSDT", &below, &cfg, &store, now()), Ok(SymbolOutcome::Quiet)));
    }

    #[test]
    fn skipped_symbol_does_not_touch_store() {
        let store = RelationStore::new();
        let cfg = config(3, CrossPolicy::RelationChange);
        let _ = evaluate("XUSDT", &hourly(&[1.0, 2.0]), &cfg, &store, now());
        assert!(store.is_empty());
    }

    #[test]
    fn summary_all_failed() {
        let mut summary = CycleSummary::default();
        assert!(!summary.all_failed());
        summary.record(&Err(fetch_timeout("AUSDT")));
        summary.record(&Err(task_error("BUSDT", "panicked")));
        assert!(summary.all_failed());
        summary.record(&Ok(SymbolOutcome::Quiet));
        assert!(!summary.all_failed());
        assert_eq!(summary.scanned, 3);
    }

    #[test]
    fn short_history_counts_as_skip_not_failure() {
        let mut summary = CycleSummary::default();
        summary.record(&Err(ScannerError::InsufficientData {
            symbol: "NEWUSDT".into(),
            candles: 12,
            minimum: 202,
        }));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(!summary.all_failed());
    }

    #[test]
    fn min_candles_is_period_plus_two() {
        assert_eq!(ScanConfig::default().min_candles(), 202);
    }
}
