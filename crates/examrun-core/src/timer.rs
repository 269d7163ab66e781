//! Countdown timer.
//!
//! [`CountdownTimer`] is plain state advanced by [`CountdownTimer::tick`];
//! [`spawn_ticker`] drives it from a tokio interval. Every start or reset
//! bumps the timer's generation, and ticks carrying an older generation are
//! ignored, so a tick already queued when the timer was stopped or
//! reconfigured can never fire against the new state.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Remaining time below which the clock is shown as a warning.
pub const WARNING_THRESHOLD_SECS: u32 = 10 * 60;

/// Result of feeding one tick into the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belongs to a stopped or superseded schedule.
    Stale,
    /// One second elapsed; this many remain.
    Running(u32),
    /// The clock just reached zero. Returned at most once per configuration.
    Expired,
}

#[derive(Debug, Clone)]
pub struct CountdownTimer {
    configured: i64,
    remaining: u32,
    running: bool,
    expired: bool,
    generation: u64,
}

impl CountdownTimer {
    /// A stopped timer holding `max(duration_secs, 0)` seconds.
    ///
    /// A non-positive duration puts the timer in untimed mode: it never
    /// starts and never expires on its own.
    pub fn new(duration_secs: i64) -> Self {
        Self {
            configured: duration_secs,
            remaining: clamp_secs(duration_secs),
            running: false,
            expired: false,
            generation: 0,
        }
    }

    /// Begin counting down. Returns the generation to stamp ticks with, or
    /// `None` when the timer cannot run (untimed, already at zero, or
    /// already running).
    pub fn start(&mut self) -> Option<u64> {
        if self.running || self.is_untimed() || self.remaining == 0 {
            return None;
        }
        self.generation += 1;
        self.running = true;
        Some(self.generation)
    }

    /// Apply one elapsed second.
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if !self.running || generation != self.generation {
            return TickOutcome::Stale;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            self.expired = true;
            return TickOutcome::Expired;
        }
        TickOutcome::Running(self.remaining)
    }

    /// Stop for good and use up the clock. Called on submission.
    pub fn force_stop(&mut self) {
        self.running = false;
        self.remaining = 0;
        self.generation += 1;
    }

    /// Reset to a new duration, e.g. when switching to another exam.
    ///
    /// The timer is left stopped; it may be started again unless the owning
    /// session is already submitted.
    pub fn reconfigure(&mut self, duration_secs: i64, session_submitted: bool) -> Option<u64> {
        self.configured = duration_secs;
        self.remaining = clamp_secs(duration_secs);
        self.running = false;
        self.expired = false;
        self.generation += 1;
        if session_submitted {
            self.remaining = 0;
            return None;
        }
        self.start()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }

    pub fn is_untimed(&self) -> bool {
        self.configured <= 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `MM:SS` rendering of the remaining time.
    pub fn clock(&self) -> String {
        format_clock(i64::from(self.remaining))
    }

    pub fn is_warning(&self) -> bool {
        self.running && self.remaining > 0 && self.remaining < WARNING_THRESHOLD_SECS
    }
}

fn clamp_secs(secs: i64) -> u32 {
    secs.clamp(0, i64::from(u32::MAX)) as u32
}

/// Format seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(total_secs: i64) -> String {
    let total = total_secs.max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Owns the background task that emits ticks. Dropping it cancels the task.
#[derive(Debug)]
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Call `on_tick` once per `period`, first after one full period.
///
/// The task ends when `on_tick` returns `false` (its receiver is gone) or
/// when the returned handle is dropped.
pub fn spawn_ticker<F>(period: Duration, mut on_tick: F) -> TickerHandle
where
    F: FnMut() -> bool + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !on_tick() {
                break;
            }
        }
    });
    TickerHandle { task }
}
