//! Technical indicator implementations.
//!
//! An `IndicatorSeries` runs parallel to the candle closes it was computed
//! from: element `i` is `None` until enough history exists, and once defined
//! it stays defined for every later index.

pub mod ema;

/// A time series of indicator values aligned index-for-index with its input.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub period: usize,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// The last two values, both required to be defined.
    pub fn last_pair(&self) -> Option<(f64, f64)> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        Some((self.value_at(n - 2)?, self.value_at(n - 1)?))
    }
}
