//! Structured logging setup.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

const QUIET_CRATES: &[&str] = &["hyper=warn", "reqwest=warn", "rustls=warn"];

pub fn parse_level(level: &str) -> Level {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber. `RUST_LOG` directives take precedence over
/// `level`; repeated calls are no-ops.
pub fn init_logging(level: &str, json: bool) {
    let level = parse_level(level);

    INIT.call_once(|| {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = build_filter(level, rust_log.as_deref());

        let builder = tracing_subscriber::fmt()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_env_filter(filter);

        let result = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        if let Err(e) = result {
            eprintln!("warning: logging already initialised: {e}");
        }
    });
}

/// HTTP crates are clamped to warn only when `rust_log` is unset, so an
/// explicit `RUST_LOG=reqwest=debug` still reaches them.
fn build_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(level.into());
    match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(directives) => builder.parse_lossy(directives),
        None => {
            let mut filter = builder.parse_lossy("");
            for directive in QUIET_CRATES {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
            filter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_crates_clamped_without_rust_log() {
        let filter = build_filter(Level::DEBUG, None).to_string();
        assert!(filter.contains("reqwest=warn"), "{filter}");
        assert!(filter.contains("hyper=warn"), "{filter}");
    }

    #[test]
    fn rust_log_overrides_clamps() {
        let filter = build_filter(Level::INFO, Some("reqwest=debug")).to_string();
        assert!(filter.contains("reqwest=debug"), "{filter}");
        assert!(!filter.contains("reqwest=warn"), "{filter}");
        assert!(!filter.contains("hyper=warn"), "{filter}");
    }

    #[test]
    fn parse_level_variants() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("Warning"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn init_is_idempotent() {
        init_logging("info", false);
        init_logging("debug", true);
    }
}
