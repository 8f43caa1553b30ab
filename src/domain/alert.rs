//! Alert aggregation and delivery.
//!
//! A cycle's detections become exactly one report: the bullish group first,
//! then the bearish group, each in universe iteration order regardless of
//! the order tasks finished in. Whether a quiet or an all-failed cycle still
//! produces a message is policy.

use crate::domain::candle::Timeframe;
use crate::domain::cross::Direction;
use crate::domain::scan::{CycleOutcome, CycleSummary, Detection};
use crate::domain::universe::Universe;
use crate::ports::notifier_port::NotifierPort;
use std::fmt::Write;
use std::str::FromStr;

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Most detections one report can carry and still fit `MAX_MESSAGE_CHARS`
/// with symbols up to `MAX_SYMBOL_CHARS`. Reports are not chunked; larger
/// reports are sent as-is and a warning is logged.
pub const MAX_REPORT_ITEMS: usize = 50;

/// Longest symbol the item budget above is sized for.
pub const MAX_SYMBOL_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuietCycles {
    Send,
    #[default]
    Suppress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailedCycles {
    /// Treat like a quiet cycle.
    Quiet,
    /// Send a distinct "market data unavailable" report.
    #[default]
    Flag,
    Suppress,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind} policy: {value}")]
pub struct UnknownCyclePolicy {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for QuietCycles {
    type Err = UnknownCyclePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "send" => Ok(QuietCycles::Send),
            "suppress" => Ok(QuietCycles::Suppress),
            other => Err(UnknownCyclePolicy {
                kind: "quiet_cycles",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for FailedCycles {
    type Err = UnknownCyclePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiet" => Ok(FailedCycles::Quiet),
            "flag" => Ok(FailedCycles::Flag),
            "suppress" => Ok(FailedCycles::Suppress),
            other => Err(UnknownCyclePolicy {
                kind: "failed_cycles",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertPolicy {
    pub quiet_cycles: QuietCycles,
    pub failed_cycles: FailedCycles,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub bullish: Vec<Detection>,
    pub bearish: Vec<Detection>,
    pub summary: CycleSummary,
    pub text: String,
}

impl Report {
    pub fn item_count(&self) -> usize {
        self.bullish.len() + self.bearish.len()
    }
}

/// Header and line formatting shared by every report kind.
#[derive(Debug, Clone, Copy)]
pub struct ReportFormat {
    pub ema_period: usize,
    pub timeframe: Timeframe,
}

impl ReportFormat {
    fn header(&self) -> String {
        format!("📊 EMA{} Cross Signals ({})", self.ema_period, self.timeframe)
    }
}

/// Split detections into ordered groups. Symbols missing from the universe
/// sort after every known symbol.
pub fn group_detections(
    universe: &Universe,
    detections: &[Detection],
) -> (Vec<Detection>, Vec<Detection>) {
    let positions = universe.positions();
    let rank = |d: &Detection| positions.get(d.symbol.as_str()).copied().unwrap_or(usize::MAX);

    let mut bullish: Vec<Detection> = detections
        .iter()
        .filter(|d| d.direction == Direction::Bullish)
        .cloned()
        .collect();
    let mut bearish: Vec<Detection> = detections
        .iter()
        .filter(|d| d.direction == Direction::Bearish)
        .cloned()
        .collect();
    bullish.sort_by_key(|d| rank(d));
    bearish.sort_by_key(|d| rank(d));
    (bullish, bearish)
}

/// Build the cycle report, or `None` when policy suppresses it.
pub fn build_report(
    universe: &Universe,
    outcome: &CycleOutcome,
    format: ReportFormat,
    policy: AlertPolicy,
) -> Option<Report> {
    let summary = outcome.summary;
    let (bullish, bearish) = group_detections(universe, &outcome.detections);
    let mut text = format.header();
    text.push_str("\n\n");

    if bullish.is_empty() && bearish.is_empty() {
        if summary.all_failed() {
            match policy.failed_cycles {
                FailedCycles::Suppress => return None,
                FailedCycles::Flag => {
                    let _ = write!(
                        text,
                        "⚠️ Market data unavailable: all {} symbol fetches failed.",
                        summary.scanned
                    );
                }
                FailedCycles::Quiet => {
                    if policy.quiet_cycles == QuietCycles::Suppress {
                        return None;
                    }
                    let _ = write!(text, "Scanned {} symbols, no signals.", summary.scanned);
                }
            }
        } else {
            if policy.quiet_cycles == QuietCycles::Suppress {
                return None;
            }
            let _ = write!(text, "Scanned {} symbols, no signals.", summary.scanned);
        }
        return Some(Report {
            bullish,
            bearish,
            summary,
            text,
        });
    }

    write_group(&mut text, "🟢 Bullish", &bullish);
    write_group(&mut text, "🔴 Bearish", &bearish);
    let _ = write!(
        text,
        "Scanned {} symbols ({} skipped, {} failed)",
        summary.scanned, summary.skipped, summary.failed
    );

    Some(Report {
        bullish,
        bearish,
        summary,
        text,
    })
}

fn write_group(text: &mut String, title: &str, group: &[Detection]) {
    if group.is_empty() {
        return;
    }
    let _ = writeln!(text, "{} ({})", title, group.len());
    for d in group {
        let _ = writeln!(
            text,
            "{} → {}  close {}  ema {}",
            d.symbol,
            d.direction,
            format_price(d.close),
            format_price(d.indicator)
        );
    }
    text.push('\n');
}

/// Fixed significant precision so line length stays bounded.
pub fn format_price(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1000.0 {
        format!("{:.2}", value)
    } else if abs >= 1.0 {
        format!("{:.4}", value)
    } else {
        format!("{:.8}", value)
    }
}

/// Build and deliver one cycle's report. Delivery failures are logged and
/// swallowed; the cycle counts as complete either way.
pub async fn dispatch(
    notifier: &dyn NotifierPort,
    universe: &Universe,
    outcome: &CycleOutcome,
    format: ReportFormat,
    policy: AlertPolicy,
) -> Option<Report> {
    let Some(report) = build_report(universe, outcome, format, policy) else {
        tracing::info!(scanned = outcome.summary.scanned, "no signals; report suppressed");
        return None;
    };

    if report.item_count() > MAX_REPORT_ITEMS {
        tracing::warn!(
            items = report.item_count(),
            max = MAX_REPORT_ITEMS,
            "report exceeds item budget and may be rejected by the channel"
        );
    }

    match notifier.send(&report.text).await {
        Ok(()) => tracing::info!(
            bullish = report.bullish.len(),
            bearish = report.bearish.len(),
            "report delivered"
        ),
        Err(e) => tracing::error!(error = %e, "report delivery failed"),
    }
    Some(report)
}
