//! Display sink
//!
//! Consumes one snapshot per tick and writes it out, either as a redrawn
//! text report or as one JSON object per line.
use crate::engine::{Phase, Snapshot};
use crate::error::{Result, TailstatError};
use crate::parser::Severity;
use crate::pipeline::SnapshotReceiver;
use chrono::Local;
use std::fmt;
use std::io::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Output format of the display sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Clear the terminal and draw the report each tick
    Report,
    /// Print each snapshot as a JSON line
    Json,
}

/// Text report for one snapshot
pub struct Report<'a> {
    snapshot: &'a Snapshot,
    debug: bool,
}

impl<'a> Report<'a> {
    pub fn new(snapshot: &'a Snapshot, debug: bool) -> Self {
        Self { snapshot, debug }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot;
        let updated = snapshot.taken_at.with_timezone(&Local);
        let warmup = match snapshot.phase {
            Phase::Warmup => " [warm-up]",
            Phase::Steady => "",
        };

        writeln!(
            f,
            "Log Analysis Report (Last Updated: {})",
            updated.format("%Y-%m-%d %H:%M:%S %Z")
        )?;
        writeln!(f, "{}", RULE)?;

        writeln!(f, "Runtime Stats:")?;
        writeln!(
            f,
            "• Entries Processed: {} (Total Ingested: {})",
            snapshot.total_in_window, snapshot.total_ingested
        )?;
        writeln!(
            f,
            "• Current Rate: {} entries/sec (Peak: {} entries/sec)",
            snapshot.current_rate, snapshot.peak_rate
        )?;
        writeln!(
            f,
            "• Adaptive Window: {} sec{} (Next: {} sec)",
            snapshot.window_secs, warmup, snapshot.next_window_secs
        )?;
        writeln!(f)?;

        let sev = &snapshot.severities;
        writeln!(f, "Pattern Analysis:")?;
        for (severity, share) in [
            (Severity::Error, sev.error),
            (Severity::Info, sev.info),
            (Severity::Debug, sev.debug),
        ] {
            writeln!(
                f,
                "• {}: {:.2}% ({} entries)",
                severity.as_str(),
                share.percent,
                share.count
            )?;
        }
        if sev.other > 0 {
            writeln!(f, "• {}: {} entries", Severity::Other.as_str(), sev.other)?;
        }
        writeln!(f)?;

        writeln!(f, "Dynamic Insights:")?;
        writeln!(f, "• Error Rate: {} errors/sec", snapshot.error_rate)?;
        writeln!(f, "• Top Errors:")?;
        if snapshot.top_errors.is_empty() {
            writeln!(f, "  (none in window)")?;
        }
        for (i, top) in snapshot.top_errors.iter().enumerate() {
            writeln!(f, "  {}. {} ({} occurrences)", i + 1, top.message, top.count)?;
        }

        if self.debug {
            writeln!(f)?;
            writeln!(f, "Debug:")?;
            match snapshot.queue_depth {
                Some(depth) => writeln!(f, "• Queue Size: {}", depth)?,
                None => writeln!(f, "• Queue Size: n/a")?,
            }
            writeln!(f, "• Malformed Lines: {}", snapshot.malformed_lines)?;
            writeln!(f, "• Timestamp Fallbacks: {}", snapshot.timestamp_fallbacks)?;
        }

        writeln!(f, "{}", RULE)?;
        writeln!(f, "Press Ctrl+C to exit")
    }
}

/// Render the text report for one snapshot
pub fn render_report(snapshot: &Snapshot, debug: bool) -> String {
    Report::new(snapshot, debug).to_string()
}

/// Write one snapshot in the given mode
pub fn write_snapshot<W: Write>(
    out: &mut W,
    snapshot: &Snapshot,
    mode: DisplayMode,
    debug: bool,
) -> Result<()> {
    let io_err = |e| TailstatError::Io {
        source: e,
        context: "Failed to write snapshot".to_string(),
    };

    match mode {
        DisplayMode::Report => {
            write!(out, "{}{}", CLEAR_SCREEN, Report::new(snapshot, debug)).map_err(io_err)?;
        }
        DisplayMode::Json => {
            let line = serde_json::to_string(snapshot).map_err(|e| TailstatError::Json {
                source: e,
                context: "Failed to serialize snapshot".to_string(),
            })?;
            writeln!(out, "{}", line).map_err(io_err)?;
        }
    }
    out.flush().map_err(io_err)
}

/// Drain snapshots until the aggregation task stops publishing.
/// Returns the number of frames written.
pub async fn display_worker<W: Write>(
    mut snapshots: SnapshotReceiver,
    mut out: W,
    mode: DisplayMode,
    debug: bool,
) -> Result<u64> {
    let mut frames = 0;
    while let Some(snapshot) = snapshots.recv().await {
        write_snapshot(&mut out, &snapshot, mode, debug)?;
        frames += 1;
    }
    tracing::debug!("Display sink finished after {} frames", frames);
    Ok(frames)
}
