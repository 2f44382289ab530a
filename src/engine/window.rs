// Adaptive window sizing
//
// The window used on a tick is chosen from the rate observed on the previous
// tick. During warm-up the window is clamped to the elapsed time instead.
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Smallest adaptive window, used under heavy load
pub const MIN_WINDOW_SECS: u64 = 30;
/// Starting window and warm-up horizon
pub const DEFAULT_WINDOW_SECS: u64 = 60;
/// Largest adaptive window, used under light load
pub const MAX_WINDOW_SECS: u64 = 120;

/// Above this rate (entries/sec) the window shrinks to [`MIN_WINDOW_SECS`]
pub const HIGH_RATE_THRESHOLD: u64 = 2500;
/// Below this rate (entries/sec) the window grows to [`MAX_WINDOW_SECS`]
pub const LOW_RATE_THRESHOLD: u64 = 600;

/// Engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Less than [`DEFAULT_WINDOW_SECS`] have elapsed since start
    Warmup,
    Steady,
}

/// Decides the window for the next tick from the rate seen on this one
pub trait WindowPolicy: Send {
    /// `current` is the window the policy chose last time
    fn next_window(&mut self, rate: u64, current: u64) -> u64;
}

/// Three-tier mapping from rate to window size
pub fn tier_for_rate(rate: u64) -> u64 {
    if rate > HIGH_RATE_THRESHOLD {
        MIN_WINDOW_SECS
    } else if rate < LOW_RATE_THRESHOLD {
        MAX_WINDOW_SECS
    } else {
        DEFAULT_WINDOW_SECS
    }
}

/// Switches tier immediately whenever the rate crosses a threshold.
///
/// A rate hovering on a threshold makes the window flip every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdPolicy;

impl WindowPolicy for ThresholdPolicy {
    fn next_window(&mut self, rate: u64, _current: u64) -> u64 {
        tier_for_rate(rate)
    }
}

/// Only switches tier after the rate has pointed at the same new tier for
/// `required_ticks` consecutive ticks
#[derive(Debug, Clone)]
pub struct HysteresisPolicy {
    required_ticks: u32,
    pending: Option<(u64, u32)>,
}

impl HysteresisPolicy {
    pub fn new(required_ticks: u32) -> Self {
        Self {
            required_ticks: required_ticks.max(1),
            pending: None,
        }
    }
}

impl WindowPolicy for HysteresisPolicy {
    fn next_window(&mut self, rate: u64, current: u64) -> u64 {
        let target = tier_for_rate(rate);
        if target == current {
            self.pending = None;
            return current;
        }

        let streak = match self.pending {
            Some((tier, streak)) if tier == target => streak + 1,
            _ => 1,
        };

        if streak >= self.required_ticks {
            self.pending = None;
            target
        } else {
            self.pending = Some((target, streak));
            current
        }
    }
}

/// Start time plus the window carried over from the previous tick
#[derive(Debug, Clone)]
pub struct WindowState {
    start: DateTime<Utc>,
    next_window_secs: u64,
}

impl WindowState {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            next_window_secs: DEFAULT_WINDOW_SECS,
        }
    }

    /// Window the previous tick chose for steady state
    pub fn next_window_secs(&self) -> u64 {
        self.next_window_secs
    }

    pub(crate) fn set_next_window(&mut self, secs: u64) {
        self.next_window_secs = secs.clamp(MIN_WINDOW_SECS, MAX_WINDOW_SECS);
    }

    /// Phase and window to use for a tick at `now`. Never returns a zero window.
    pub fn effective(&self, now: DateTime<Utc>) -> (Phase, u64) {
        let elapsed = u64::try_from((now - self.start).num_seconds()).unwrap_or(0);
        if elapsed < DEFAULT_WINDOW_SECS {
            (Phase::Warmup, elapsed.max(1))
        } else {
            (Phase::Steady, self.next_window_secs)
        }
    }
}
