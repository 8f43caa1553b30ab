//! Exponential Moving Average indicator.
//!
//! alpha = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = EMA[i-1] + alpha*(C[i] - EMA[i-1]).
//! Warmup: first (n-1) points are undefined.

use crate::domain::indicator::IndicatorSeries;

pub fn calculate_ema(closes: &[f64], period: usize) -> IndicatorSeries {
    let mut values = vec![None; closes.len()];

    if period == 0 || closes.len() < period {
        return IndicatorSeries { period, values };
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;
    values[period - 1] = Some(seed);

    let mut ema = seed;
    for (i, &close) in closes.iter().enumerate().skip(period) {
        ema += alpha * (close - ema);
        values[i] = Some(ema);
    }

    IndicatorSeries { period, values }
}
