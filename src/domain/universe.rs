//! Universe of symbols under surveillance.
//!
//! A snapshot is loaded once at startup. Every symbol shares one quote asset,
//! and iteration order is the order reports are written in.

use crate::domain::error::ScannerError;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    symbols: Vec<String>,
    quote: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("symbol {symbol} is not quoted in {quote}")]
    WrongQuote { symbol: String, quote: String },
}

impl Universe {
    /// Build a snapshot, rejecting duplicates and symbols with another quote.
    pub fn new(symbols: Vec<String>, quote: &str) -> Result<Self, UniverseError> {
        let quote = quote.trim().to_uppercase();
        let mut seen = HashSet::new();
        for symbol in &symbols {
            if symbol.len() <= quote.len() || !symbol.ends_with(&quote) {
                return Err(UniverseError::WrongQuote {
                    symbol: symbol.clone(),
                    quote,
                });
            }
            if !seen.insert(symbol.as_str()) {
                return Err(UniverseError::DuplicateSymbol(symbol.clone()));
            }
        }
        Ok(Self { symbols, quote })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn count(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol -> iteration index, used to order report groups.
    pub fn positions(&self) -> HashMap<&str, usize> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect()
    }

    /// Fatal if the loaded universe ended up empty.
    pub fn require_non_empty(self) -> Result<Self, ScannerError> {
        if self.symbols.is_empty() {
            return Err(ScannerError::UniverseEmpty { quote: self.quote });
        }
        Ok(self)
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("BTCUSDT,ETHUSDT,SOLUSDT").unwrap();
        assert_eq!(result, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    }

    #[test]
    fn parse_symbols_whitespace_and_case() {
        let result = parse_symbols("  btcusdt , EthUsdt ,SOLUSDT").unwrap();
        assert_eq!(result, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert_eq!(parse_symbols("BTCUSDT,,ETHUSDT"), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_symbols_duplicate() {
        assert!(matches!(
            parse_symbols("BTCUSDT,ETHUSDT,btcusdt"),
            Err(UniverseError::DuplicateSymbol(s)) if s == "BTCUSDT"
        ));
    }

    #[test]
    fn universe_enforces_single_quote() {
        let err = Universe::new(vec!["BTCUSDT".into(), "ETHBTC".into()], "USDT").unwrap_err();
        assert!(matches!(err, UniverseError::WrongQuote { symbol, .. } if symbol == "ETHBTC"));
    }

    #[test]
    fn universe_rejects_bare_quote() {
        assert!(Universe::new(vec!["USDT".into()], "usdt").is_err());
    }

    #[test]
    fn universe_positions_follow_iteration_order() {
        let universe =
            Universe::new(vec!["AUSDT".into(), "BUSDT".into(), "CUSDT".into()], "USDT").unwrap();
        let pos = universe.positions();
        assert_eq!(pos["AUSDT"], 0);
        assert_eq!(pos["CUSDT"], 2);
        assert_eq!(universe.count(), 3);
        assert_eq!(universe.quote(), "USDT");
    }

    #[test]
    fn empty_universe_is_fatal() {
        let universe = Universe::new(Vec::new(), "USDT").unwrap();
        let err = universe.require_non_empty().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ScannerError::UniverseEmpty { quote } if quote == "USDT"));
    }
}
