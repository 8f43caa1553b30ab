//! Candle representation and timeframes.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

/// A closed (or still forming) price aggregate for one symbol and timeframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub close: f64,
    pub close_time: DateTime<Utc>,
}

impl Candle {
    pub fn new(close: f64, close_time: DateTime<Utc>) -> Self {
        Self { close, close_time }
    }

    /// Closed iff close_time <= now - safety_buffer.
    pub fn is_closed(&self, now: DateTime<Utc>, safety_buffer: TimeDelta) -> bool {
        self.close_time <= now - safety_buffer
    }
}

/// Sort by close time and collapse duplicate close times, keeping the last
/// revision of each, so the result is strictly increasing.
pub fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.close_time);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        if let Some(last) = out.last_mut() {
            if last.close_time == candle.close_time {
                *last = candle;
                continue;
            }
        }
        out.push(candle);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown timeframe: {0}")]
pub struct UnknownTimeframe(pub String);

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::H6 => 360,
            Timeframe::H8 => 480,
            Timeframe::H12 => 720,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(self) -> TimeDelta {
        TimeDelta::minutes(self.minutes())
    }

    /// Interval string understood by the market data provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "4h" => Ok(Timeframe::H4),
            "6h" => Ok(Timeframe::H6),
            "8h" => Ok(Timeframe::H8),
            "12h" => Ok(Timeframe::H12),
            "1d" => Ok(Timeframe::D1),
            other => Err(UnknownTimeframe(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn closed_respects_safety_buffer() {
        let candle = Candle::new(1.0, at(10, 0, 0));
        let buffer = TimeDelta::seconds(3);
        assert!(!candle.is_closed(at(10, 0, 2), buffer));
        assert!(candle.is_closed(at(10, 0, 3), buffer));
        assert!(candle.is_closed(at(11, 0, 0), buffer));
    }

    #[test]
    fn normalize_sorts_and_collapses_duplicates() {
        let candles = vec![
            Candle::new(3.0, at(12, 0, 0)),
            Candle::new(1.0, at(10, 0, 0)),
            Candle::new(2.0, at(11, 0, 0)),
            Candle::new(2.5, at(11, 0, 0)),
        ];
        let out = normalize_candles(candles);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].close, 1.0);
        assert_eq!(out[1].close, 2.5);
        assert_eq!(out[2].close, 3.0);
        assert!(out.windows(2).all(|w| w[0].close_time < w[1].close_time));
    }

    #[test]
    fn normalize_empty() {
        assert!(normalize_candles(Vec::new()).is_empty());
    }

    #[test]
    fn timeframe_parse_and_display() {
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert_eq!(" 15M ".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!(Timeframe::H1.to_string(), "1H");
        assert_eq!(Timeframe::M15.as_str(), "15m");
        assert_eq!(Timeframe::D1.duration(), TimeDelta::days(1));
        assert!(matches!(
            "7h".parse::<Timeframe>(),
            Err(UnknownTimeframe(s)) if s == "7h"
        ));
    }
}
