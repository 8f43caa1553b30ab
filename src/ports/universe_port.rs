//! Symbol universe discovery port.

use crate::domain::error::ScannerError;
use async_trait::async_trait;

/// Upper bound on universe load attempts.
pub const MAX_LOAD_ATTEMPTS: u32 = 10;

#[async_trait]
pub trait UniversePort: Send + Sync {
    /// Symbols quoted in `quote` that are currently trading. May be empty.
    async fn load_symbols(&self, quote: &str) -> Result<Vec<String>, ScannerError>;
}
