//! Universe provider backed by a symbol list from configuration.

use crate::domain::error::ScannerError;
use crate::domain::universe::parse_symbols;
use crate::ports::universe_port::UniversePort;
use async_trait::async_trait;

pub struct StaticUniverseAdapter {
    symbols: String,
}

impl StaticUniverseAdapter {
    pub fn new(symbols: impl Into<String>) -> Self {
        Self {
            symbols: symbols.into(),
        }
    }
}

#[async_trait]
impl UniversePort for StaticUniverseAdapter {
    async fn load_symbols(&self, quote: &str) -> Result<Vec<String>, ScannerError> {
        if self.symbols.trim().is_empty() {
            return Ok(Vec::new());
        }
        let symbols = parse_symbols(&self.symbols).map_err(|e| ScannerError::UniverseLoad {
            reason: e.to_string(),
        })?;
        tracing::info!(count = symbols.len(), quote, "loaded static universe");
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_configured_list() {
        let adapter = StaticUniverseAdapter::new("btcusdt, ETHUSDT");
        assert_eq!(
            adapter.load_symbols("USDT").await.unwrap(),
            vec!["BTCUSDT", "ETHUSDT"]
        );
    }

    #[tokio::test]
    async fn blank_list_is_empty_not_error() {
        let adapter = StaticUniverseAdapter::new("  ");
        assert!(adapter.load_symbols("USDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_is_load_error() {
        let adapter = StaticUniverseAdapter::new("BTCUSDT,BTCUSDT");
        let err = adapter.load_symbols("USDT").await.unwrap_err();
        assert!(matches!(err, ScannerError::UniverseLoad { .. }));
    }
}
