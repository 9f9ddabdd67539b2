use crate::averaging::{unix_seconds, SampleContext};
use crate::grouping::Granularity;
use crate::interpolation::Sample;
use crate::Record;
use chrono::{DateTime, TimeZone, Utc};
use std::convert::Infallible;

/// Loaded diary records, newest first.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<Record>,
}

impl MemoryStore {
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| b.when.cmp(&a.when).then(b.id.cmp(&a.id)));
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// `(bucket start, when)` of every record, newest first.
    pub fn time_labels<'a, Tz: TimeZone + 'a>(
        &'a self,
        granularity: Granularity,
        tz: &'a Tz,
    ) -> impl Iterator<Item = Result<(DateTime<Tz>, DateTime<Utc>), Infallible>> + 'a {
        self.records.iter().map(move |record| {
            let label = granularity.truncate(&record.local_when(tz));
            Ok((label, record.when))
        })
    }

    /// Records with `min <= when <= max`, newest first.
    pub fn between(&self, min: &DateTime<Utc>, max: &DateTime<Utc>) -> &[Record] {
        let start = self.records.partition_point(|r| r.when > *max);
        let end = self.records.partition_point(|r| r.when >= *min);
        if start >= end {
            return &[];
        }
        &self.records[start..end]
    }

    /// Plain offset/limit slice, newest first.
    pub fn slice(&self, offset: usize, limit: usize) -> &[Record] {
        let start = offset.min(self.records.len());
        let end = offset.saturating_add(limit).min(self.records.len());
        &self.records[start..end]
    }
}

fn metering_sample(record: &Record) -> Option<Sample> {
    record
        .meterings
        .first()
        .map(|level| Sample::new(unix_seconds(&record.when), level.to_f64()))
}

impl SampleContext for MemoryStore {
    fn sample_before(&self, when: DateTime<Utc>) -> Option<Sample> {
        let older = self.records.partition_point(|r| r.when >= when);
        self.records[older..].iter().find_map(metering_sample)
    }

    fn sample_after(&self, when: DateTime<Utc>) -> Option<Sample> {
        let newer = self.records.partition_point(|r| r.when > when);
        self.records[..newer].iter().rev().find_map(metering_sample)
    }
}
