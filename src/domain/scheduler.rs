//! Candle-aligned scheduler.
//!
//! The scheduler is the only component that reads the clock. It sleeps until
//! the next period boundary plus a safety buffer, hands the cycle the time it
//! woke at, and does not compute the next boundary until the cycle settles.
//! Boundaries are aligned to the Unix epoch in UTC, which matches exchange
//! candle opens for every supported timeframe.

use crate::ports::clock_port::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Waiting,
    Running,
}

/// Delay until the next boundary of `period` plus `safety_buffer`.
///
/// A time sitting exactly on a boundary wraps forward a full period, so the
/// result is always strictly greater than the buffer.
pub fn delay_until_next_boundary(
    now: DateTime<Utc>,
    period: TimeDelta,
    safety_buffer: TimeDelta,
) -> Duration {
    let period_ms = period.num_milliseconds().max(1);
    let now_ms = now.timestamp_millis();

    let mut until_boundary = (period_ms - now_ms.rem_euclid(period_ms)) % period_ms;
    if until_boundary <= 0 {
        until_boundary += period_ms;
    }

    let total = until_boundary + safety_buffer.num_milliseconds().max(0);
    Duration::from_millis(total as u64)
}

pub fn next_boundary(now: DateTime<Utc>, period: TimeDelta) -> DateTime<Utc> {
    let delay = delay_until_next_boundary(now, period, TimeDelta::zero());
    now + TimeDelta::milliseconds(delay.as_millis() as i64)
}

pub struct Scheduler<C: Clock> {
    clock: C,
    period: TimeDelta,
    safety_buffer: TimeDelta,
    state: SchedulerState,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C, period: TimeDelta, safety_buffer: TimeDelta) -> Self {
        Self {
            clock,
            period,
            safety_buffer,
            state: SchedulerState::Waiting,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drive `cycle` once per boundary until `shutdown` resolves or
    /// `max_cycles` cycles have run. Returns the number of completed cycles.
    ///
    /// Shutdown is honoured both while waiting and mid-cycle; an interrupted
    /// cycle future is dropped, which abandons its in-flight work.
    pub async fn run<F, Fut, S>(
        &mut self,
        max_cycles: Option<usize>,
        shutdown: S,
        mut cycle: F,
    ) -> usize
    where
        F: FnMut(DateTime<Utc>) -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let period_ms = self.period.num_milliseconds().max(1);
        let mut completed = 0usize;
        let mut last_boundary: Option<DateTime<Utc>> = None;

        loop {
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }

            self.state = SchedulerState::Waiting;
            let now = self.clock.now();
            let delay = delay_until_next_boundary(now, self.period, self.safety_buffer);
            let boundary = next_boundary(now, self.period);
            if let Some(prev) = last_boundary {
                let missed = (boundary - prev).num_milliseconds() / period_ms - 1;
                if missed > 0 {
                    tracing::warn!(missed, "cycle overran; boundaries skipped");
                }
            }
            tracing::info!(
                delay_secs = delay.as_secs(),
                boundary = %boundary,
                "waiting for next candle close"
            );

            tokio::select! {
                _ = self.clock.sleep(delay) => {}
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested while waiting");
                    break;
                }
            }

            self.state = SchedulerState::Running;
            let started = self.clock.now();
            tracing::info!(cycle = completed + 1, at = %started, "cycle started");

            tokio::select! {
                _ = cycle(started) => {}
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested mid-cycle; in-flight work abandoned");
                    break;
                }
            }

            completed += 1;
            last_boundary = Some(boundary);
        }

        self.state = SchedulerState::Waiting;
        completed
    }
}
