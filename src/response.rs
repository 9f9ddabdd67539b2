//! Page payloads served to the diary table.

use crate::error::CurveError;
use crate::grouping::Granularity;
use crate::listing::ListedRecord;
use crate::pagination::{slice_pages, PageRequest, PageWindow};
use crate::report::{self, Column, ReportRow};
use crate::store::MemoryStore;
use chrono::TimeZone;
use log::info;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt::Display;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowsResponse {
    pub rows: Vec<ReportRow>,
    pub columns: Vec<Column>,
    pub total_rows_count: usize,
    pub total_pages_count: usize,
    pub page_number: usize,
    pub first_shown: usize,
    pub last_shown: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordsResponse {
    pub records: Vec<ListedRecord>,
    pub total_rows_count: usize,
    pub total_pages_count: usize,
    pub page_number: usize,
    pub first_shown: usize,
    pub last_shown: usize,
}

fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// One page of report rows grouped by `granularity`.
pub fn rows_response<Tz: TimeZone>(
    store: &MemoryStore,
    granularity: Granularity,
    page: PageRequest,
    page_size: NonZeroUsize,
    tz: &Tz,
) -> Result<RowsResponse, CurveError> {
    let window = unwrap_infallible(slice_pages(
        store.time_labels(granularity, tz),
        page,
        page_size,
    ));

    let records = match &window.bounds {
        Some((min, max)) => store.between(min, max),
        None => &[],
    };
    let report = report::assemble(records, granularity, tz, store)?;

    info!(
        "Rows page {}/{} by {}: {} rows from {} records",
        window.page_number,
        window.total_pages,
        granularity,
        report.rows.len(),
        records.len()
    );

    Ok(RowsResponse {
        rows: report.rows,
        columns: report.columns,
        total_rows_count: window.total_rows,
        total_pages_count: window.total_pages,
        page_number: window.page_number,
        first_shown: window.first_shown,
        last_shown: window.last_shown,
    })
}

/// One page of plain records, newest first.
pub fn records_response<Tz>(
    store: &MemoryStore,
    page: PageRequest,
    page_size: NonZeroUsize,
    tz: &Tz,
) -> RecordsResponse
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // every record is its own row
    let window: PageWindow<_> = unwrap_infallible(slice_pages(
        store
            .records()
            .iter()
            .enumerate()
            .map(|(position, record)| Ok((position, record.when))),
        page,
        page_size,
    ));

    let offset = (window.page_number - 1) * page_size.get();
    let records: Vec<ListedRecord> = store
        .slice(offset, page_size.get())
        .iter()
        .map(|record| ListedRecord::new(record, tz))
        .collect();

    info!(
        "Records page {}/{}: {} records",
        window.page_number,
        window.total_pages,
        records.len()
    );

    RecordsResponse {
        records,
        total_rows_count: window.total_rows,
        total_pages_count: window.total_pages,
        page_number: window.page_number,
        first_shown: window.first_shown,
        last_shown: window.last_shown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Level, Record};
    use chrono::{DateTime, Utc};

    fn store(count: i64) -> MemoryStore {
        MemoryStore::new(
            (1..=count)
                .map(|id| {
                    let mut record =
                        Record::new(id, DateTime::from_timestamp(id * 3600, 0).unwrap());
                    record.meterings.push(Level::from_tenths(50 + id as i32));
                    record
                })
                .collect(),
        )
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn records_pages_follow_plain_offsets() {
        let s = store(7);
        let page = records_response(&s, PageRequest::Number(2), size(3), &Utc);
        let ids: Vec<i64> = page.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
        assert_eq!(page.total_rows_count, 7);
        assert_eq!(page.total_pages_count, 3);
        assert_eq!((page.first_shown, page.last_shown), (4, 6));

        let last = records_response(&s, PageRequest::Last, size(3), &Utc);
        assert_eq!(last.page_number, 3);
        assert_eq!(last.records.len(), 1);

        let past_end = records_response(&s, PageRequest::Number(9), size(3), &Utc);
        assert_eq!(past_end.page_number, 3);
    }

    #[test]
    fn empty_store_gives_an_empty_first_page() {
        let s = MemoryStore::default();
        let rows = rows_response(&s, Granularity::Day, PageRequest::Last, size(10), &Utc).unwrap();
        assert!(rows.rows.is_empty());
        assert_eq!(rows.page_number, 1);
        assert_eq!(rows.total_rows_count, 0);
        assert_eq!((rows.first_shown, rows.last_shown), (0, 0));
        assert_eq!(rows.columns.len(), 6);

        let records = records_response(&s, PageRequest::Number(3), size(10), &Utc);
        assert!(records.records.is_empty());
        assert_eq!(records.page_number, 1);
    }

    #[test]
    fn ungrouped_rows_are_paged_per_record() {
        let s = store(5);
        let page = rows_response(&s, Granularity::None, PageRequest::Number(2), size(3), &Utc)
            .unwrap();
        assert_eq!(page.total_rows_count, 5);
        assert_eq!(page.total_pages_count, 2);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].label, "1970-01-01 02:00");
    }
}
