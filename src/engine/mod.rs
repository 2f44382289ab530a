//! Aggregation engine
//!
//! Owns every piece of mutable statistics state: the bucket store, the
//! window state, the peak rate and the cumulative diagnostic counters. It is
//! driven by exactly one task (see [`crate::pipeline`]), so nothing here is
//! locked. The outside world only ever sees [`Snapshot`] values.
mod snapshot;
mod store;
mod top;
mod window;

pub use snapshot::{SeverityShare, SeverityStats, Snapshot};
pub use store::BucketStore;
pub use top::{rank, TopError, TOP_ERRORS};
pub use window::{
    tier_for_rate, HysteresisPolicy, Phase, ThresholdPolicy, WindowPolicy, WindowState,
    DEFAULT_WINDOW_SECS, HIGH_RATE_THRESHOLD, LOW_RATE_THRESHOLD, MAX_WINDOW_SECS,
    MIN_WINDOW_SECS,
};

use ahash::{HashMap, HashMapExt};
use chrono::{DateTime, Utc};

use crate::parser::{LineOutcome, ParseError, Record, Severity};
use snapshot::percent;

/// Counters that survive window eviction
#[derive(Debug, Default, Clone, Copy)]
struct Diagnostics {
    ingested: u64,
    malformed_lines: u64,
    timestamp_fallbacks: u64,
}

/// Sliding-window statistics engine
pub struct Aggregator<P: WindowPolicy = ThresholdPolicy> {
    store: BucketStore,
    window: WindowState,
    policy: P,
    peak_rate: u64,
    diagnostics: Diagnostics,
    last_reported_malformed: u64,
}

impl Aggregator<ThresholdPolicy> {
    /// Create an engine that started at `start`, using the default
    /// three-tier window policy
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_policy(start, ThresholdPolicy)
    }
}

impl<P: WindowPolicy> Aggregator<P> {
    pub fn with_policy(start: DateTime<Utc>, policy: P) -> Self {
        Self {
            store: BucketStore::new(),
            window: WindowState::new(start),
            policy,
            peak_rate: 0,
            diagnostics: Diagnostics::default(),
            last_reported_malformed: 0,
        }
    }

    /// Apply one ingestion-queue item
    pub fn observe(&mut self, outcome: LineOutcome) {
        match outcome {
            Ok(parsed) => {
                if parsed.timestamp_fallback {
                    self.diagnostics.timestamp_fallbacks += 1;
                }
                self.ingest(parsed.record);
            }
            Err(e) => self.reject(&e),
        }
    }

    /// Store a record. It is reflected from the next tick on.
    pub fn ingest(&mut self, record: Record) {
        self.diagnostics.ingested += 1;
        self.store.insert(record);
    }

    /// Count a line the producer could not use
    pub fn reject(&mut self, error: &ParseError) {
        tracing::debug!("Skipping line: {}", error);
        match error {
            ParseError::MalformedLine { .. } => self.diagnostics.malformed_lines += 1,
            ParseError::MalformedTimestamp { .. } => self.diagnostics.timestamp_fallbacks += 1,
        }
    }

    /// Window that will be used once warm-up is over
    pub fn next_window_secs(&self) -> u64 {
        self.window.next_window_secs()
    }

    /// Records currently held in the window
    pub fn buffered_records(&self) -> usize {
        self.store.len()
    }

    /// Run one tick at `now`: evict, re-aggregate, adapt the window and build
    /// the snapshot. `queue_depth` is passed through for debug output.
    pub fn tick(&mut self, now: DateTime<Utc>, queue_depth: Option<usize>) -> Snapshot {
        let (phase, window_secs) = self.window.effective(now);

        let evicted = self.store.evict_older_than(now, window_secs);
        if evicted > 0 {
            tracing::trace!("Evicted {} records outside {}s window", evicted, window_secs);
        }

        let mut severities = SeverityStats::default();
        let mut error_table: HashMap<&str, u64> = HashMap::new();
        for record in self.store.records() {
            match record.severity {
                Severity::Error => {
                    severities.error.count += 1;
                    *error_table.entry(record.message.as_str()).or_insert(0) += 1;
                }
                Severity::Info => severities.info.count += 1,
                Severity::Debug => severities.debug.count += 1,
                Severity::Other => severities.other += 1,
            }
        }

        let total = severities.total();
        severities.error.percent = percent(severities.error.count, total);
        severities.info.percent = percent(severities.info.count, total);
        severities.debug.percent = percent(severities.debug.count, total);

        // window_secs is never zero
        let current_rate = total / window_secs;
        let error_rate = severities.error.count / window_secs;
        self.peak_rate = self.peak_rate.max(current_rate);

        let current = self.window.next_window_secs();
        let next = self.policy.next_window(current_rate, current);
        self.window.set_next_window(next);
        if self.window.next_window_secs() != current {
            tracing::debug!(
                "Adaptive window {}s -> {}s at {} entries/sec",
                current,
                self.window.next_window_secs(),
                current_rate
            );
        }

        let top_errors = rank(&error_table, TOP_ERRORS);

        if self.diagnostics.malformed_lines != self.last_reported_malformed {
            tracing::warn!(
                "{} malformed lines skipped so far",
                self.diagnostics.malformed_lines
            );
            self.last_reported_malformed = self.diagnostics.malformed_lines;
        }

        Snapshot {
            taken_at: now,
            phase,
            total_in_window: total,
            total_ingested: self.diagnostics.ingested,
            current_rate,
            peak_rate: self.peak_rate,
            window_secs,
            next_window_secs: self.window.next_window_secs(),
            severities,
            error_rate,
            top_errors,
            malformed_lines: self.diagnostics.malformed_lines,
            timestamp_fallbacks: self.diagnostics.timestamp_fallbacks,
            queue_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_tick() {
        let mut engine = Aggregator::new(start());
        let snap = engine.tick(start() + Duration::seconds(1), None);

        assert_eq!(snap.total_in_window, 0);
        assert_eq!(snap.current_rate, 0);
        assert_eq!(snap.severities.error.percent, 0.0);
        assert_eq!(snap.severities.info.percent, 0.0);
        assert_eq!(snap.severities.debug.percent, 0.0);
        assert!(snap.top_errors.is_empty());
        assert_eq!(snap.queue_depth, None);
    }

    #[test]
    fn test_first_tick_at_start_has_nonzero_window() {
        let mut engine = Aggregator::new(start());
        engine.ingest(Record::new(Severity::Info, "boot", start()));
        let snap = engine.tick(start(), Some(0));
        assert_eq!(snap.window_secs, 1);
        assert_eq!(snap.current_rate, 1);
        assert_eq!(snap.queue_depth, Some(0));
    }

    #[test]
    fn test_record_reflected_on_next_tick_only() {
        let mut engine = Aggregator::new(start());
        let first = engine.tick(start() + Duration::seconds(1), None);
        assert_eq!(first.total_in_window, 0);

        engine.ingest(Record::new(
            Severity::Error,
            "late",
            start() + Duration::seconds(1),
        ));
        let second = engine.tick(start() + Duration::seconds(2), None);
        assert_eq!(second.total_in_window, 1);
        assert_eq!(second.severities.error.count, 1);
    }

    #[test]
    fn test_window_rolls_off() {
        let mut engine = Aggregator::new(start());
        engine.ingest(Record::new(Severity::Error, "old", start()));
        engine.ingest(Record::new(
            Severity::Error,
            "recent",
            start() + Duration::seconds(100),
        ));

        // Steady state, default 60s window: only the recent record survives
        let snap = engine.tick(start() + Duration::seconds(120), None);
        assert_eq!(snap.phase, Phase::Steady);
        assert_eq!(snap.window_secs, DEFAULT_WINDOW_SECS);
        assert_eq!(snap.total_in_window, 1);
        assert_eq!(snap.total_ingested, 2);
        assert_eq!(snap.top_errors[0].message, "recent");
        assert_eq!(engine.buffered_records(), 1);
    }

    #[test]
    fn test_other_severity_counted_not_percented() {
        let mut engine = Aggregator::new(start());
        let t = start() + Duration::seconds(1);
        engine.ingest(Record::new(Severity::Info, "a", t));
        engine.ingest(Record::new(Severity::Other, "b", t));
        engine.ingest(Record::new(Severity::Other, "c", t));
        engine.ingest(Record::new(Severity::Debug, "d", t));

        let snap = engine.tick(start() + Duration::seconds(2), None);
        assert_eq!(snap.total_in_window, 4);
        assert_eq!(snap.severities.other, 2);
        assert_eq!(snap.severities.info.percent, 25.0);
        assert_eq!(snap.severities.debug.percent, 25.0);
        assert_eq!(snap.severities.total(), snap.total_in_window);
    }

    #[test]
    fn test_observe_counts_rejections_and_fallbacks() {
        let mut engine = Aggregator::new(start());
        let now = start() + Duration::seconds(3);

        engine.observe(parse_line("garbage line", now));
        engine.observe(parse_line("not-a-time INFO a b hello", now));
        engine.observe(parse_line("\"2024-05-01T00:00:02Z\" DEBUG a b hi", now));

        let snap = engine.tick(now, None);
        assert_eq!(snap.malformed_lines, 1);
        assert_eq!(snap.timestamp_fallbacks, 1);
        assert_eq!(snap.total_in_window, 2);
    }

    #[test]
    fn test_peak_rate_carried_forward() {
        let mut engine = Aggregator::new(start());
        let t = start() + Duration::seconds(1);
        for _ in 0..50 {
            engine.ingest(Record::new(Severity::Info, "burst", t));
        }
        let burst = engine.tick(start() + Duration::seconds(2), None);
        assert_eq!(burst.current_rate, 25);
        assert_eq!(burst.peak_rate, 25);

        // Quiet ticks never lower the peak
        let mut previous = burst.peak_rate;
        for secs in 3..200 {
            let snap = engine.tick(start() + Duration::seconds(secs), None);
            assert!(snap.peak_rate >= previous);
            previous = snap.peak_rate;
        }
        assert_eq!(previous, 25);
    }

    #[test]
    fn test_hysteresis_engine_holds_window() {
        let mut engine = Aggregator::with_policy(start(), HysteresisPolicy::new(2));
        let t = start() + Duration::seconds(1);
        for _ in 0..10 {
            engine.ingest(Record::new(Severity::Info, "x", t));
        }
        let snap = engine.tick(start() + Duration::seconds(2), None);
        assert_eq!(snap.next_window_secs, DEFAULT_WINDOW_SECS);

        let snap = engine.tick(start() + Duration::seconds(3), None);
        assert_eq!(snap.next_window_secs, MAX_WINDOW_SECS);
    }
}
