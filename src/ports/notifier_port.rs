//! Outbound notification port.

use crate::domain::error::ScannerError;
use async_trait::async_trait;

#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Deliver one message. Failures are reported, never retried here.
    async fn send(&self, text: &str) -> Result<(), ScannerError>;
}
