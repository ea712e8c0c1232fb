//! Recent-record tracking for the live feed and rate calculations.

use std::collections::VecDeque;
use std::time::Instant;

use crate::source::TelemetryRecord;

/// Maximum number of records to keep.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks the most recent records of the current monitoring run.
#[derive(Debug, Clone, Default)]
pub struct RecordHistory {
    /// Most recent records, oldest first.
    pub records: VecDeque<TelemetryRecord>,
    /// Arrival time of each kept record.
    pub timestamps: VecDeque<Instant>,
    /// Records seen since the last reset, including evicted ones.
    pub total: u64,
}

impl RecordHistory {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly received record.
    pub fn record(&mut self, record: TelemetryRecord) {
        self.record_at(record, Instant::now());
    }

    fn record_at(&mut self, record: TelemetryRecord, at: Instant) {
        self.records.push_back(record);
        self.timestamps.push_back(at);
        if self.records.len() > MAX_HISTORY_SIZE {
            self.records.pop_front();
            self.timestamps.pop_front();
        }
        self.total += 1;
    }

    /// Forget everything, e.g. when a new run starts.
    pub fn clear(&mut self) {
        self.records.clear();
        self.timestamps.clear();
        self.total = 0;
    }

    /// The most recent record.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.records.back()
    }

    /// Records per second over the kept window.
    ///
    /// Returns None if there's not enough history to calculate a rate.
    pub fn rate(&self) -> Option<f64> {
        if self.timestamps.len() < 2 {
            return None;
        }
        let first = self.timestamps.front()?;
        let last = self.timestamps.back()?;
        let elapsed = last.duration_since(*first).as_secs_f64();

        if elapsed > 0.0 {
            Some((self.timestamps.len() - 1) as f64 / elapsed)
        } else {
            None
        }
    }
}
