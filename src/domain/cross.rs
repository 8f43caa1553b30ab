//! Cross detection between a close price and its indicator.
//!
//! Two policies are available:
//! - `TwoPoint`: stateless; re-derived from the last two closed candles on
//!   every cycle. Strict inequalities on both sides, so any tie is no signal.
//! - `RelationChange`: stateful; compares the relation of the latest closed
//!   candle against the relation stored for the symbol on the previous cycle.
//!   The first observation of a symbol only seeds. A tie never overwrites the
//!   stored relation.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "BULLISH"),
            Direction::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Sign of (close - indicator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Relation {
    Above,
    Below,
    #[default]
    Unset,
}

impl Relation {
    pub fn of(close: f64, indicator: f64) -> Self {
        if close > indicator {
            Relation::Above
        } else if close < indicator {
            Relation::Below
        } else {
            Relation::Unset
        }
    }
}

/// A close paired with its indicator value at the same candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub close: f64,
    pub indicator: f64,
}

impl Observation {
    pub fn new(close: f64, indicator: f64) -> Self {
        Self { close, indicator }
    }

    pub fn relation(&self) -> Relation {
        Relation::of(self.close, self.indicator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossPolicy {
    #[default]
    TwoPoint,
    RelationChange,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown cross policy: {0} (expected two_point or relation_change)")]
pub struct UnknownPolicy(pub String);

impl FromStr for CrossPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "two_point" | "two-point" => Ok(CrossPolicy::TwoPoint),
            "relation_change" | "relation-change" => Ok(CrossPolicy::RelationChange),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for CrossPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossPolicy::TwoPoint => write!(f, "two_point"),
            CrossPolicy::RelationChange => write!(f, "relation_change"),
        }
    }
}

pub fn two_point(prev: Observation, curr: Observation) -> Option<Direction> {
    if prev.close < prev.indicator && curr.close > curr.indicator {
        Some(Direction::Bullish)
    } else if prev.close > prev.indicator && curr.close < curr.indicator {
        Some(Direction::Bearish)
    } else {
        None
    }
}

/// Returns the signal (if any) and the relation to store for the next cycle.
pub fn relation_change(stored: Relation, current: Relation) -> (Option<Direction>, Relation) {
    match (stored, current) {
        (_, Relation::Unset) => (None, stored),
        (Relation::Unset, _) => (None, current),
        (s, c) if s == c => (None, current),
        (_, Relation::Above) => (Some(Direction::Bullish), current),
        (_, Relation::Below) => (Some(Direction::Bearish), current),
    }
}
