// Immutable per-tick statistics
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::top::TopError;
use super::window::Phase;

/// Count and share of one tracked severity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SeverityShare {
    pub count: u64,
    /// Percentage of all records in the window; 0 when the window is empty
    pub percent: f64,
}

/// Severity mix of the records in the window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SeverityStats {
    pub error: SeverityShare,
    pub info: SeverityShare,
    pub debug: SeverityShare,
    /// Unrecognised levels are counted but get no percentage
    pub other: u64,
}

impl SeverityStats {
    /// Sum of every severity count, equal to the records in the window
    pub fn total(&self) -> u64 {
        self.error.count + self.info.count + self.debug.count + self.other
    }
}

/// One complete statistics frame, built fresh on every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Tick instant the frame was computed for
    pub taken_at: DateTime<Utc>,
    pub phase: Phase,
    /// Records inside the window on this tick
    pub total_in_window: u64,
    /// Running total of every record accepted since start
    pub total_ingested: u64,
    /// Entries per second over the window
    pub current_rate: u64,
    /// Highest `current_rate` seen so far
    pub peak_rate: u64,
    /// Window used for this tick
    pub window_secs: u64,
    /// Window chosen for the next steady-state tick
    pub next_window_secs: u64,
    pub severities: SeverityStats,
    /// Errors per second over the window
    pub error_rate: u64,
    /// Up to three most frequent error messages
    pub top_errors: Vec<TopError>,
    /// Lines rejected since start
    pub malformed_lines: u64,
    /// Lines whose timestamp was replaced by ingestion time, since start
    pub timestamp_fallbacks: u64,
    /// Ingestion queue depth, only filled in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<usize>,
}

pub(crate) fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}
