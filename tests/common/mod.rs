#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use emacross::domain::candle::{Candle, Timeframe};
use emacross::domain::error::{FetchError, ScannerError};
use emacross::domain::scan::ScanConfig;
use emacross::domain::universe::Universe;
use emacross::ports::clock_port::Clock;
use emacross::ports::market_data_port::MarketDataPort;
use emacross::ports::notifier_port::NotifierPort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory market data. Candles can be swapped between cycles.
pub struct MockMarketData {
    pub data: Mutex<HashMap<String, Vec<Candle>>>,
    pub errors: HashMap<String, FetchError>,
    pub panic_on: Option<String>,
    pub delay: Duration,
    pub requests: Mutex<Vec<(String, usize, DateTime<Utc>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            errors: HashMap::new(),
            panic_on: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_candles(self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.set_candles(symbol, candles);
        self
    }

    pub fn with_error(mut self, symbol: &str, error: FetchError) -> Self {
        self.errors.insert(symbol.to_string(), error);
        self
    }

    pub fn with_panic(mut self, symbol: &str) -> Self {
        self.panic_on = Some(symbol.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.data
            .lock()
            .unwrap()
            .insert(symbol.to_string(), candles);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Candle>, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), limit, end_time));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.as_deref() == Some(symbol) {
            panic!("mock market data exploded for {symbol}");
        }
        if let Some(e) = self.errors.get(symbol) {
            return Err(e.clone());
        }
        Ok(self
            .data
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

/// Captures every delivered message; optionally fails delivery.
#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPort for MockNotifier {
    async fn send(&self, text: &str) -> Result<(), ScannerError> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(ScannerError::Notify {
                reason: "HTTP 502 Bad Gateway".into(),
            });
        }
        Ok(())
    }
}

/// Clock whose sleeps advance time instantly. Clones share state.
#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(TimeDelta::milliseconds(duration.as_millis() as i64));
        tokio::task::yield_now().await;
    }
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Candles of `timeframe` whose last one closes just before `boundary`.
pub fn closed_candles(closes: &[f64], timeframe: Timeframe, boundary: DateTime<Utc>) -> Vec<Candle> {
    let last_close = boundary - TimeDelta::milliseconds(1);
    let n = closes.len() as i32;
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle::new(c, last_close - timeframe.duration() * (n - 1 - i as i32)))
        .collect()
}

/// `flat` closes at `base`, then `tail` appended.
pub fn series(base: f64, flat: usize, tail: &[f64]) -> Vec<f64> {
    let mut closes = vec![base; flat];
    closes.extend_from_slice(tail);
    closes
}

pub fn small_config(period: usize) -> ScanConfig {
    ScanConfig {
        timeframe: Timeframe::H1,
        ema_period: period,
        history: period + 10,
        concurrency: 4,
        safety_buffer: TimeDelta::seconds(3),
        ..ScanConfig::default()
    }
}

pub fn universe(symbols: &[&str]) -> Universe {
    Universe::new(symbols.iter().map(|s| s.to_string()).collect(), "USDT").unwrap()
}

pub fn bullish_closes(period: usize) -> Vec<f64> {
    series(10.0, period + 1, &[9.0, 12.0])
}

pub fn bearish_closes(period: usize) -> Vec<f64> {
    series(10.0, period + 1, &[11.0, 8.0])
}

pub fn flat_closes(period: usize) -> Vec<f64> {
    series(10.0, period, &[11.0, 11.5])
}
