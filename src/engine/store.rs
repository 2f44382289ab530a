// Time-bucketed record store for the sliding window
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::parser::Record;

/// Records grouped by their timestamp, truncated to whole seconds.
///
/// Ordered by key so eviction is a single split instead of a full scan.
/// Evicted records are dropped for good.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: BTreeMap<i64, Vec<Record>>,
    len: usize,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to the bucket for its second
    pub fn insert(&mut self, record: Record) {
        self.buckets
            .entry(record.timestamp.timestamp())
            .or_default()
            .push(record);
        self.len += 1;
    }

    /// Drop every bucket more than `window_secs` whole seconds older than `now`.
    /// Returns the number of records evicted.
    pub fn evict_older_than(&mut self, now: DateTime<Utc>, window_secs: u64) -> usize {
        let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
        let oldest_kept = now.timestamp().saturating_sub(window);

        let kept = self.buckets.split_off(&oldest_kept);
        let evicted: usize = self.buckets.values().map(Vec::len).sum();
        self.buckets = kept;
        self.len -= evicted;
        evicted
    }

    /// Every record currently in the window
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.buckets.values().flatten()
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct second buckets held
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
