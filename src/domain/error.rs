//! Domain error types.

/// Why a single market-data request produced no usable candles.
///
/// Every variant is recoverable: the orchestrator skips the symbol for the
/// current cycle and the next boundary retries it naturally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("endpoint {endpoint} failed: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("empty response")]
    EmptyResponse,
}

impl FetchError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::RateLimited => "rate_limited",
            FetchError::Endpoint { .. } => "endpoint",
            FetchError::EmptyResponse => "empty_response",
        }
    }
}

/// Top-level error type for emacross.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to load universe: {reason}")]
    UniverseLoad { reason: String },

    #[error("universe is empty for quote asset {quote}")]
    UniverseEmpty { quote: String },

    #[error("fetch failed for {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: FetchError,
    },

    #[error("insufficient data for {symbol}: have {candles} candles, need {minimum}")]
    InsufficientData {
        symbol: String,
        candles: usize,
        minimum: usize,
    },

    #[error("scan task for {symbol} {reason}")]
    ScanTask { symbol: String, reason: String },

    #[error("notification delivery failed: {reason}")]
    Notify { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScannerError {
    /// Only configuration and universe-load errors may terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScannerError::ConfigParse { .. }
                | ScannerError::ConfigMissing { .. }
                | ScannerError::ConfigInvalid { .. }
                | ScannerError::UniverseLoad { .. }
                | ScannerError::UniverseEmpty { .. }
                | ScannerError::Io(_)
        )
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ScannerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        ScannerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&ScannerError> for std::process::ExitCode {
    fn from(err: &ScannerError) -> Self {
        let code: u8 = match err {
            ScannerError::Io(_) => 1,
            ScannerError::ConfigParse { .. }
            | ScannerError::ConfigMissing { .. }
            | ScannerError::ConfigInvalid { .. } => 2,
            ScannerError::UniverseLoad { .. } | ScannerError::UniverseEmpty { .. } => 3,
            ScannerError::Fetch { .. }
            | ScannerError::InsufficientData { .. }
            | ScannerError::ScanTask { .. } => 4,
            ScannerError::Notify { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
