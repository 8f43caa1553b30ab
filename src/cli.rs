//! CLI definition and dispatch.

use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::binance::exchange_info::{BinanceUniverseAdapter, DEFAULT_MAX_RETRIES};
use crate::adapters::binance::klines::BinanceKlineAdapter;
use crate::adapters::binance::{BinanceClient, DEFAULT_ENDPOINTS, DEFAULT_TIMEOUT_SECS};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::static_universe::StaticUniverseAdapter;
use crate::adapters::stdout_notifier::StdoutNotifier;
use crate::adapters::system_clock::SystemClock;
use crate::adapters::telegram_notifier::TelegramNotifier;
use crate::domain::alert::{self, AlertPolicy, FailedCycles, QuietCycles, ReportFormat};
use crate::domain::candle::Timeframe;
use crate::domain::config_validation::{
    double_or, int_or, validate_credentials, validate_scanner_config,
};
use crate::domain::cross::CrossPolicy;
use crate::domain::error::{FetchError, ScannerError};
use crate::domain::scan::{
    ScanConfig, Scanner, DEFAULT_CONCURRENCY, DEFAULT_EMA_PERIOD, DEFAULT_HISTORY,
    DEFAULT_SAFETY_BUFFER_SECS,
};
use crate::domain::scheduler::{delay_until_next_boundary, next_boundary, Scheduler};
use crate::domain::universe::Universe;
use crate::logging::init_logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::NotifierPort;
use crate::ports::universe_port::{UniversePort, MAX_LOAD_ATTEMPTS};

const DEFAULT_QUOTE: &str = "USDT";

#[derive(Parser, Debug)]
#[command(name = "emacross", about = "Candle-aligned EMA cross scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan at every candle close until interrupted
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Print reports to stdout instead of sending them
        #[arg(long)]
        stdout: bool,
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<usize>,
    },
    /// Run a single scan cycle immediately
    Once {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        stdout: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load and print the symbol universe
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show when the next cycle would start
    NextBoundary {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            stdout,
            max_cycles,
        } => run_scanner(&config, stdout, Mode::Loop(max_cycles)),
        Command::Once { config, stdout } => run_scanner(&config, stdout, Mode::Once),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::NextBoundary { config } => run_next_boundary(&config),
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Once,
    Loop(Option<usize>),
}

/// Load the INI file and layer credential overrides from the environment.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path)
        .map(|adapter| {
            adapter
                .with_override("telegram", "bot_token", std::env::var("TELEGRAM_BOT_TOKEN").ok())
                .with_override("telegram", "chat_id", std::env::var("TELEGRAM_CHAT_ID").ok())
        })
        .map_err(|e| {
            let err = ScannerError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            };
            eprintln!("error: {err}");
            ExitCode::from(&err)
        })
}

fn fail(err: &ScannerError) -> ExitCode {
    tracing::error!(error = %err, "fatal");
    eprintln!("error: {err}");
    err.into()
}

/// Load config, start logging and validate. Shared by every subcommand.
fn prepare(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    let config = load_config(path)?;
    let level = config
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level, config.get_bool("logging", "json", false));

    validate_scanner_config(&config).map_err(|e| fail(&e))?;
    Ok(config)
}

fn build_runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| fail(&ScannerError::Io(e)))
}

pub fn build_scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, ScannerError> {
    let timeframe = match config.get_string("scanner", "timeframe") {
        Some(tf) => tf
            .parse::<Timeframe>()
            .map_err(|e| ScannerError::invalid("scanner", "timeframe", e.to_string()))?,
        None => Timeframe::H1,
    };
    let policy = match config.get_string("scanner", "policy") {
        Some(p) => p
            .parse::<CrossPolicy>()
            .map_err(|e| ScannerError::invalid("scanner", "policy", e.to_string()))?,
        None => CrossPolicy::default(),
    };

    let ema_period = positive(config, "ema_period", DEFAULT_EMA_PERIOD as i64)?;
    let history = positive(
        config,
        "history",
        DEFAULT_HISTORY.max(ema_period + 2) as i64,
    )?;
    let concurrency = positive(config, "concurrency", DEFAULT_CONCURRENCY as i64)?;
    let buffer_secs = positive(config, "safety_buffer_secs", DEFAULT_SAFETY_BUFFER_SECS)?;

    Ok(ScanConfig {
        timeframe,
        ema_period,
        history,
        concurrency,
        safety_buffer: TimeDelta::seconds(buffer_secs as i64),
        policy,
    })
}

fn positive(config: &dyn ConfigPort, key: &str, default: i64) -> Result<usize, ScannerError> {
    let value = int_or(config, "scanner", key, default)?;
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ScannerError::invalid("scanner", key, "must be a positive integer"))
}

pub fn build_alert_policy(config: &dyn ConfigPort) -> Result<AlertPolicy, ScannerError> {
    let quiet_cycles = match config.get_string("scanner", "quiet_cycles") {
        Some(v) => v
            .parse::<QuietCycles>()
            .map_err(|e| ScannerError::invalid("scanner", "quiet_cycles", e.to_string()))?,
        None => QuietCycles::default(),
    };
    let failed_cycles = match config.get_string("scanner", "failed_cycles") {
        Some(v) => v
            .parse::<FailedCycles>()
            .map_err(|e| ScannerError::invalid("scanner", "failed_cycles", e.to_string()))?,
        None => FailedCycles::default(),
    };
    Ok(AlertPolicy {
        quiet_cycles,
        failed_cycles,
    })
}

pub fn build_binance_client(config: &dyn ConfigPort) -> Result<BinanceClient, ScannerError> {
    let mut endpoints = config.get_list("binance", "endpoints");
    if endpoints.is_empty() {
        endpoints = DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect();
    }
    let secs = double_or(config, "binance", "timeout_secs", DEFAULT_TIMEOUT_SECS as f64)?;
    let timeout = Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|t| !t.is_zero())
        .ok_or_else(|| ScannerError::invalid("binance", "timeout_secs", "must be a positive duration"))?;
    BinanceClient::new(endpoints, timeout).map_err(|e: FetchError| {
        ScannerError::invalid("binance", "endpoints", e.to_string())
    })
}

pub fn quote_asset(config: &dyn ConfigPort) -> String {
    config
        .get_string("universe", "quote_asset")
        .map(|q| q.trim().to_uppercase())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_QUOTE.to_string())
}

pub fn build_universe_port(
    config: &dyn ConfigPort,
    client: Arc<BinanceClient>,
) -> Box<dyn UniversePort> {
    let source = config
        .get_string("universe", "source")
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if source == "static" {
        let symbols = config.get_string("universe", "symbols").unwrap_or_default();
        return Box::new(StaticUniverseAdapter::new(symbols));
    }
    let retries = config
        .get_int("universe", "max_retries", DEFAULT_MAX_RETRIES as i64)
        .clamp(1, MAX_LOAD_ATTEMPTS as i64);
    Box::new(BinanceUniverseAdapter::new(client, retries as u32))
}

/// Reports go to Telegram unless `stdout` is set; missing credentials are
/// fatal rather than a silent fallback.
pub fn build_notifier(
    config: &dyn ConfigPort,
    stdout: bool,
) -> Result<Box<dyn NotifierPort>, ScannerError> {
    if stdout {
        return Ok(Box::new(StdoutNotifier));
    }
    let (token, chat_id) = validate_credentials(config)?;
    Ok(Box::new(TelegramNotifier::new(token, chat_id)?))
}

pub async fn load_universe(
    port: &dyn UniversePort,
    quote: &str,
) -> Result<Universe, ScannerError> {
    let symbols = port.load_symbols(quote).await?;
    Universe::new(symbols, quote)
        .map_err(|e| ScannerError::UniverseLoad {
            reason: e.to_string(),
        })?
        .require_non_empty()
}

/// Resolve when the process receives Ctrl-C. If the handler cannot be
/// installed the future never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

fn run_scanner(config_path: &Path, stdout: bool, mode: Mode) -> ExitCode {
    let config = match prepare(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let scan_config = match build_scan_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let policy = match build_alert_policy(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let notifier = match build_notifier(&config, stdout) {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };
    let client = match build_binance_client(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => return fail(&e),
    };
    let universe_port = build_universe_port(&config, Arc::clone(&client));
    let quote = quote_asset(&config);
    let format = ReportFormat {
        ema_period: scan_config.ema_period,
        timeframe: scan_config.timeframe,
    };

    let runtime = match build_runtime() {
        Ok(r) => r,
        Err(code) => return code,
    };

    let result = runtime.block_on(async {
        let universe = load_universe(universe_port.as_ref(), &quote).await?;
        tracing::info!(
            symbols = universe.count(),
            quote = %quote,
            timeframe = %scan_config.timeframe,
            ema_period = scan_config.ema_period,
            policy = %scan_config.policy,
            "scanner ready"
        );

        let period = scan_config.timeframe.duration();
        let buffer = scan_config.safety_buffer;
        let scanner = Scanner::new(Arc::new(BinanceKlineAdapter::new(client)), scan_config);

        match mode {
            Mode::Once => {
                let outcome = scanner.run_cycle(&universe, Utc::now()).await;
                alert::dispatch(notifier.as_ref(), &universe, &outcome, format, policy).await;
            }
            Mode::Loop(max_cycles) => {
                let mut scheduler = Scheduler::new(SystemClock, period, buffer);
                let scanner = &scanner;
                let universe = &universe;
                let notifier = notifier.as_ref();
                let completed = scheduler
                    .run(max_cycles, shutdown_signal(), move |now| async move {
                        let outcome = scanner.run_cycle(universe, now).await;
                        alert::dispatch(notifier, universe, &outcome, format, policy).await;
                    })
                    .await;
                tracing::info!(cycles = completed, "scanner stopped");
            }
        }
        Ok::<(), ScannerError>(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match prepare(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let scan = match build_scan_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let policy = match build_alert_policy(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    let source = config
        .get_string("universe", "source")
        .unwrap_or_else(|| "binance".to_string());
    eprintln!("  timeframe:      {}", scan.timeframe.as_str());
    eprintln!("  ema_period:     {}", scan.ema_period);
    eprintln!("  history:        {}", scan.history);
    eprintln!("  concurrency:    {}", scan.concurrency);
    eprintln!("  safety_buffer:  {}s", scan.safety_buffer.num_seconds());
    eprintln!("  policy:         {}", scan.policy);
    eprintln!("  quiet_cycles:   {:?}", policy.quiet_cycles);
    eprintln!("  failed_cycles:  {:?}", policy.failed_cycles);
    eprintln!("  universe:       {} ({})", source.trim(), quote_asset(&config));

    match validate_credentials(&config) {
        Ok(_) => eprintln!("  telegram:       configured"),
        Err(e) => eprintln!("  telegram:       {e} (only --stdout will work)"),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match prepare(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let client = match build_binance_client(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => return fail(&e),
    };
    let port = build_universe_port(&config, client);
    let quote = quote_asset(&config);

    let runtime = match build_runtime() {
        Ok(r) => r,
        Err(code) => return code,
    };
    match runtime.block_on(load_universe(port.as_ref(), &quote)) {
        Ok(universe) => {
            for symbol in universe.symbols() {
                println!("{}", symbol);
            }
            eprintln!("{} symbols quoted in {}", universe.count(), universe.quote());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_next_boundary(config_path: &Path) -> ExitCode {
    let config = match prepare(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let scan = match build_scan_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let now = Utc::now();
    let period = scan.timeframe.duration();
    let boundary = next_boundary(now, period);
    let delay = delay_until_next_boundary(now, period, scan.safety_buffer);
    let starts = now + TimeDelta::milliseconds(delay.as_millis() as i64);

    println!("{}", starts.to_rfc3339());
    eprintln!(
        "{} candle closes at {}; cycle starts in {}s",
        scan.timeframe,
        boundary.to_rfc3339(),
        delay.as_secs()
    );
    ExitCode::SUCCESS
}
