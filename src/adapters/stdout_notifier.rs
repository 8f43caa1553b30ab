//! Prints reports to stdout. Only used when explicitly requested.

use crate::domain::error::ScannerError;
use crate::ports::notifier_port::NotifierPort;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl NotifierPort for StdoutNotifier {
    async fn send(&self, text: &str) -> Result<(), ScannerError> {
        println!("{}\n", text);
        Ok(())
    }
}
