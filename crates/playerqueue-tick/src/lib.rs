//! Periodic scheduler for the player queue's background jobs.
//!
//! The coordinator runs two maintenance loops: reconciliation against the
//! live occupancy feed (every couple of seconds) and zombie eviction (every
//! half minute). Each loop owns a [`TickScheduler`]. Compared with a bare
//! `tokio::time::interval` it adds:
//!
//! - a random delay on the first tick, so loops created together drift apart;
//! - skip-ahead after a late wake-up, with a warning naming the loop;
//! - a warning when a pass eats most of its period;
//! - a disabled mode where a zero period never fires.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = cancel.cancelled() => break,
//!         info = reconcile.wait_for_tick() => {
//!             coordinator.update_state(&feed).await;
//!             let took = reconcile.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Zero disables the scheduler.
    pub period: Duration,
    /// Upper bound for the random delay added to the first tick.
    pub initial_jitter: Duration,
    /// Fraction of the period (0.0 to 1.0) a pass may take before it is
    /// reported as slow.
    pub slow_pass_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            initial_jitter: Duration::from_millis(250),
            slow_pass_threshold: 0.8,
        }
    }
}

impl TickConfig {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Brings out-of-range values back into range. The jitter never
    /// exceeds one period and the threshold stays within `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        self.slow_pass_threshold = self.slow_pass_threshold.clamp(0.0, 1.0);
        if !self.period.is_zero() && self.initial_jitter > self.period {
            warn!(
                jitter_ms = self.initial_jitter.as_millis() as u64,
                period_ms = self.period.as_millis() as u64,
                "initial jitter longer than the period, capping"
            );
            self.initial_jitter = self.period;
        }
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.period.is_zero()
    }
}

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// 1 for the first tick, then counting up.
    pub tick: u64,
    /// Whole periods that passed unobserved before this tick fired.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives one background loop.
pub struct TickScheduler {
    name: &'static str,
    config: TickConfig,
    tick_count: u64,
    next_tick: Option<Instant>,
    pass_started: Option<Instant>,
}

impl TickScheduler {
    /// `name` labels the scheduler's log lines. The first tick fires one
    /// period plus a random jitter after this call.
    pub fn new(name: &'static str, config: TickConfig) -> Self {
        let config = config.validated();

        let next_tick = if config.is_disabled() {
            debug!(name, "scheduler disabled");
            None
        } else {
            debug!(
                name,
                period_ms = config.period.as_millis() as u64,
                "scheduler created"
            );
            Some(Instant::now() + config.period + first_jitter(config.initial_jitter))
        };

        Self {
            name,
            config,
            tick_count: 0,
            next_tick,
            pass_started: None,
        }
    }

    pub fn every(name: &'static str, period: Duration) -> Self {
        Self::new(name, TickConfig::every(period))
    }

    /// Waits for the next tick. Pends forever when disabled, which lets the
    /// other `select!` branches carry on.
    ///
    /// A tick that fires late does not try to catch up. The following one
    /// is due a full period after the late wake-up.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(due) = self.next_tick else {
            return std::future::pending().await;
        };
        let period = self.config.period;

        time::sleep_until(due).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.pass_started = Some(now);
        self.next_tick = Some(now + period);

        let late_by = now.saturating_duration_since(due);
        let ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                name = self.name,
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_millis() as u64,
                "loop fell behind, skipping ahead"
            );
        }

        trace!(name = self.name, tick = self.tick_count, "tick");
        TickInfo {
            tick: self.tick_count,
            ticks_skipped,
        }
    }

    /// Marks the end of the pass started by the last tick and warns if it
    /// ran long. Returns how long the pass took, or `None` if no pass was
    /// in progress.
    pub fn record_tick_end(&mut self) -> Option<Duration> {
        let started = self.pass_started.take()?;
        let elapsed = started.elapsed();

        let share = elapsed.as_secs_f64() / self.config.period.as_secs_f64();
        if share >= self.config.slow_pass_threshold {
            warn!(
                name = self.name,
                tick = self.tick_count,
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = self.config.period.as_millis() as u64,
                "slow pass"
            );
        }
        Some(elapsed)
    }
}

fn first_jitter(max: Duration) -> Duration {
    let max_us = max.as_micros() as u64;
    if max_us == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::rng().random_range(0..max_us))
}
