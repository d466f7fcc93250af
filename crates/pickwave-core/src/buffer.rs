//! Sliding per-stream buffer of recently arrived waveform records.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{Component, Record, StreamKey, TimeWindow};

#[derive(Debug, Default)]
struct ChannelGroup {
    /// Insertion order == arrival order; records are never reordered.
    records: HashMap<Component, Vec<Record>>,
    high_water: HashMap<Component, DateTime<Utc>>,
}

/// Trailing window of live records per stream, split by orientation
/// component, with the latest observed end time per component.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    streams: HashMap<StreamKey, ChannelGroup>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and raise the component's high-water mark to the
    /// record's end time. The mark never moves backwards.
    pub fn ingest(&mut self, record: Record) {
        let group = self.streams.entry(record.key.clone()).or_default();
        let mark = group
            .high_water
            .entry(record.component)
            .or_insert(record.end);
        if record.end > *mark {
            *mark = record.end;
        }
        group.records.entry(record.component).or_default().push(record);
    }

    /// Whether any record for this stream has ever been observed live.
    pub fn is_live(&self, key: &StreamKey) -> bool {
        self.streams
            .get(key)
            .is_some_and(|group| !group.high_water.is_empty())
    }

    pub fn high_water(&self, key: &StreamKey, component: Component) -> Option<DateTime<Utc>> {
        self.streams
            .get(key)?
            .high_water
            .get(&component)
            .copied()
    }

    /// Minimum high-water mark across the stream's components: the point
    /// before which every component is known complete.
    pub fn min_high_water(&self, key: &StreamKey) -> Option<DateTime<Utc>> {
        self.streams.get(key)?.high_water.values().min().copied()
    }

    /// All buffered records for the component overlapping the window.
    pub fn extract(&self, key: &StreamKey, component: Component, window: TimeWindow) -> Vec<Record> {
        match self.streams.get(key).and_then(|g| g.records.get(&component)) {
            Some(records) => records
                .iter()
                .filter(|r| window.overlaps(r))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Discard records older than the slowest component's mark minus
    /// `retention`. Trimming against the slowest component keeps data a
    /// still-pending request might need from a lagging channel.
    pub fn trim(&mut self, retention: Duration) -> usize {
        let mut dropped = 0;
        for group in self.streams.values_mut() {
            let Some(min) = group.high_water.values().min().copied() else {
                continue;
            };
            let cutoff = min - retention;
            for records in group.records.values_mut() {
                let before = records.len();
                records.retain(|r| r.end > cutoff);
                dropped += before - records.len();
            }
        }
        dropped
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn record_count(&self) -> usize {
        self.streams
            .values()
            .map(|g| g.records.values().map(Vec::len).sum::<usize>())
            .sum()
    }
}
