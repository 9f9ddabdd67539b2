//! Report rows: one per bucket, with glucose, meal and insulin columns.

use crate::averaging::{unix_seconds, SampleContext, TrapezoidalAverager, WindowStats};
use crate::error::CurveError;
use crate::grouping::{Bucket, Granularity};
use crate::{Level, Record};
use chrono::TimeZone;
use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

pub const TIME_LABEL: &str = "time_label";
pub const SUGAR_LEVEL: &str = "sugar_level";
pub const MAX_SUGAR: &str = "max_sugar";
pub const MIN_SUGAR: &str = "min_sugar";
pub const METERINGS_COUNT: &str = "meterings_count";
pub const MEAL: &str = "meal";

/// Shown in the glucose cells of a bucket without meterings.
pub const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub data_index: String,
    pub header: String,
}

impl Column {
    fn new(data_index: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            data_index: data_index.into(),
            header: header.into(),
        }
    }
}

pub fn insulin_data_index(kind: &str) -> String {
    format!("insulin_{}", kind)
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlucoseCell {
    /// Ungrouped row: the record's own metering, if any.
    Single(Option<Level>),
    /// Bucket with at least one metering.
    Summary { stats: WindowStats, count: usize },
    /// Bucket without meterings.
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub glucose: GlucoseCell,
    pub meal_total: Option<Level>,
    /// Every insulin kind of the report; `None` when the bucket has no known
    /// quantity of that kind.
    pub insulin: BTreeMap<String, Option<u32>>,
}

impl Serialize for ReportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(TIME_LABEL, &self.label)?;
        match &self.glucose {
            GlucoseCell::Single(level) => {
                map.serialize_entry(SUGAR_LEVEL, level)?;
            }
            GlucoseCell::Summary { stats, count } => {
                map.serialize_entry(SUGAR_LEVEL, &format_average(stats.average))?;
                map.serialize_entry(MAX_SUGAR, &format_extreme(stats.max))?;
                map.serialize_entry(MIN_SUGAR, &format_extreme(stats.min))?;
                map.serialize_entry(METERINGS_COUNT, count)?;
            }
            GlucoseCell::NoData => {
                for key in [SUGAR_LEVEL, MAX_SUGAR, MIN_SUGAR, METERINGS_COUNT] {
                    map.serialize_entry(key, PLACEHOLDER)?;
                }
            }
        }
        map.serialize_entry(MEAL, &self.meal_total)?;
        for (kind, quantity) in &self.insulin {
            map.serialize_entry(&insulin_data_index(kind), quantity)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub columns: Vec<Column>,
    pub rows: Vec<ReportRow>,
}

/// Average glucose cell: always two decimals.
pub fn format_average(value: f64) -> String {
    format!("{:.2}", value)
}

/// Min/max glucose cell: two decimals with one trailing zero dropped
/// (`4.80` -> `4.8`, `4.00` -> `4.0`).
pub fn format_extreme(value: f64) -> String {
    let mut verbose = format!("{:.2}", value);
    if verbose.ends_with('0') {
        verbose.pop();
    }
    verbose
}

struct Group<'a, Tz: TimeZone> {
    bucket: Bucket<Tz>,
    records: Vec<&'a Record>,
}

/// Consecutive records sharing a bucket, in input order.
fn group_records<'a, Tz: TimeZone>(
    records: &'a [Record],
    granularity: Granularity,
    tz: &Tz,
) -> Vec<Group<'a, Tz>> {
    let mut groups: Vec<Group<'a, Tz>> = Vec::new();
    for record in records {
        let local = record.local_when(tz);
        match groups.last_mut() {
            Some(group) if group.bucket.contains(&local) => group.records.push(record),
            _ => groups.push(Group {
                bucket: granularity.bucket_for(&local),
                records: vec![record],
            }),
        }
    }
    groups
}

fn columns_for(granularity: Granularity, kinds: &BTreeSet<&str>) -> Vec<Column> {
    let mut columns = vec![Column::new(TIME_LABEL, "Date/time")];
    if granularity.is_grouped() {
        columns.extend([
            Column::new(SUGAR_LEVEL, "Average sugar"),
            Column::new(MAX_SUGAR, "Max"),
            Column::new(MIN_SUGAR, "Min"),
            Column::new(METERINGS_COUNT, "Meterings"),
        ]);
    } else {
        columns.push(Column::new(SUGAR_LEVEL, "Blood sugar"));
    }
    columns.push(Column::new(MEAL, "Eaten (XE)"));
    columns.extend(
        kinds
            .iter()
            .map(|kind| Column::new(insulin_data_index(kind), *kind)),
    );
    columns
}

/// Curve through the meterings of `records` plus one stored metering on each
/// side of them. Meterings sharing a second keep the first one seen.
fn page_curve<C: SampleContext + ?Sized>(
    records: &[Record],
    context: &C,
) -> TrapezoidalAverager {
    let mut averager = TrapezoidalAverager::new();

    let mut by_second: BTreeMap<i64, f64> = BTreeMap::new();
    for record in records {
        if let Some(level) = record.meterings.first() {
            by_second
                .entry(record.when.timestamp())
                .or_insert_with(|| level.to_f64());
        }
    }
    for (&second, &value) in &by_second {
        averager.add_sample(second as f64, value);
    }

    if let (Some(newest), Some(oldest)) = (records.first(), records.last()) {
        averager.extend_with_context(context, oldest.when, newest.when);
    }
    averager
}

fn bucket_glucose<Tz: TimeZone>(
    averager: &mut TrapezoidalAverager,
    group: &Group<'_, Tz>,
) -> Result<GlucoseCell, CurveError> {
    let count: usize = group.records.iter().map(|r| r.meterings.len()).sum();
    if count == 0 {
        return Ok(GlucoseCell::NoData);
    }

    let begin = unix_seconds(&group.bucket.start);
    let end = unix_seconds(&group.bucket.end);
    let stats = match averager.summarize(begin, end) {
        Ok(stats) => stats,
        // a lone metering with nothing around it: the bucket is a single point
        Err(CurveError::DegenerateWindow { at }) => {
            let value = averager.value_at(at)?;
            WindowStats {
                average: value,
                min: value,
                max: value,
            }
        }
        Err(e) => return Err(e),
    };
    Ok(GlucoseCell::Summary { stats, count })
}

fn meal_total(records: &[&Record]) -> Option<Level> {
    let mut meals = records.iter().flat_map(|r| r.meals.iter()).peekable();
    meals.peek()?;
    Some(meals.sum())
}

fn insulin_totals(records: &[&Record], kinds: &BTreeSet<&str>) -> BTreeMap<String, Option<u32>> {
    let mut totals: BTreeMap<String, Option<u32>> =
        kinds.iter().map(|kind| (kind.to_string(), None)).collect();
    for injection in records.iter().flat_map(|r| r.injections.iter()) {
        if let (Some(total), Some(quantity)) =
            (totals.get_mut(&injection.kind), injection.quantity)
        {
            *total = Some(total.unwrap_or(0).saturating_add(quantity));
        }
    }
    totals
}

/// Builds the report for one page of records (newest first).
///
/// Rows keep the input order. Insulin columns cover every kind found in the
/// page and are sorted by kind name.
pub fn assemble<Tz, C>(
    records: &[Record],
    granularity: Granularity,
    tz: &Tz,
    context: &C,
) -> Result<Report, CurveError>
where
    Tz: TimeZone,
    C: SampleContext + ?Sized,
{
    let kinds: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.injections.iter())
        .map(|injection| injection.kind.as_str())
        .collect();
    let columns = columns_for(granularity, &kinds);

    let groups = group_records(records, granularity, tz);
    let mut averager = if granularity.is_grouped() {
        Some(page_curve(records, context))
    } else {
        None
    };

    let mut rows = Vec::with_capacity(groups.len());
    for group in &groups {
        let glucose = match averager.as_mut() {
            Some(averager) => bucket_glucose(averager, group)?,
            None => GlucoseCell::Single(
                group
                    .records
                    .iter()
                    .find_map(|r| r.meterings.first().copied()),
            ),
        };

        rows.push(ReportRow {
            label: group.bucket.label.clone(),
            glucose,
            meal_total: meal_total(&group.records),
            insulin: insulin_totals(&group.records, &kinds),
        });
    }

    debug!(
        "Assembled {} rows by {} from {} records, {} insulin kinds",
        rows.len(),
        granularity,
        records.len(),
        kinds.len()
    );
    Ok(Report { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::Sample;
    use crate::Injection;
    use chrono::{DateTime, FixedOffset, Utc};
    use serde_json::{json, Value};

    struct NoContext;

    impl SampleContext for NoContext {
        fn sample_before(&self, _when: DateTime<Utc>) -> Option<Sample> {
            None
        }

        fn sample_after(&self, _when: DateTime<Utc>) -> Option<Sample> {
            None
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn level(s: &str) -> Level {
        s.parse().unwrap()
    }

    fn record(id: i64, when: DateTime<Utc>) -> Record {
        Record::new(id, when)
    }

    fn injection(kind: &str, quantity: Option<u32>) -> Injection {
        Injection {
            kind: kind.to_string(),
            quantity,
        }
    }

    #[test]
    fn extreme_formatting_drops_a_single_trailing_zero() {
        assert_eq!(format_extreme(4.8), "4.8");
        assert_eq!(format_extreme(4.0), "4.0");
        assert_eq!(format_extreme(4.25), "4.25");
        assert_eq!(format_extreme(10.5), "10.5");
        assert_eq!(format_average(4.0), "4.00");
        assert_eq!(format_average(6.666666), "6.67");
    }

    #[test]
    fn insulin_columns_cover_every_kind_in_every_row() {
        let mut a = record(2, at(2024, 5, 2, 9, 0));
        a.injections.push(injection("Foo", Some(4)));
        let mut b = record(1, at(2024, 5, 1, 9, 0));
        b.injections.push(injection("Bar", Some(6)));
        b.injections.push(injection("Bar", Some(2)));

        let report = assemble(&[a, b], Granularity::Day, &utc(), &NoContext).unwrap();

        let insulin_headers: Vec<&str> = report
            .columns
            .iter()
            .filter(|c| c.data_index.starts_with("insulin_"))
            .map(|c| c.header.as_str())
            .collect();
        assert_eq!(insulin_headers, vec!["Bar", "Foo"]);

        let rows = serde_json::to_value(&report.rows).unwrap();
        assert_eq!(rows[0]["insulin_Foo"], json!(4));
        assert_eq!(rows[0]["insulin_Bar"], Value::Null);
        assert_eq!(rows[1]["insulin_Foo"], Value::Null);
        assert_eq!(rows[1]["insulin_Bar"], json!(8));
    }

    #[test]
    fn explicit_zero_injection_differs_from_absence() {
        let mut a = record(1, at(2024, 5, 1, 9, 0));
        a.injections.push(injection("Foo", Some(0)));
        a.injections.push(injection("Bar", None));

        let report = assemble(&[a], Granularity::Day, &utc(), &NoContext).unwrap();
        let row = &report.rows[0];
        assert_eq!(row.insulin["Foo"], Some(0));
        assert_eq!(row.insulin["Bar"], None);
    }

    #[test]
    fn meals_are_summed_per_bucket() {
        let mut a = record(3, at(2024, 5, 2, 18, 0));
        a.meals.push(level("2.5"));
        let mut b = record(2, at(2024, 5, 2, 8, 0));
        b.meals.push(level("1.5"));
        b.meals.push(level("1.0"));
        let c = record(1, at(2024, 5, 1, 8, 0));

        let report = assemble(&[a, b, c], Granularity::Day, &utc(), &NoContext).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].meal_total, Some(level("5.0")));
        assert_eq!(report.rows[1].meal_total, None);
    }

    #[test]
    fn buckets_without_meterings_get_placeholders() {
        let mut a = record(3, at(2024, 5, 3, 8, 0));
        a.meterings.push(level("6.0"));
        let b = record(2, at(2024, 5, 2, 8, 0));
        let mut c = record(1, at(2024, 5, 1, 8, 0));
        c.meterings.push(level("8.0"));

        let report = assemble(&[a, b, c], Granularity::Day, &utc(), &NoContext).unwrap();
        assert_eq!(report.rows[1].glucose, GlucoseCell::NoData);

        let row = serde_json::to_value(&report.rows[1]).unwrap();
        assert_eq!(row[SUGAR_LEVEL], json!("-"));
        assert_eq!(row[MAX_SUGAR], json!("-"));
        assert_eq!(row[MIN_SUGAR], json!("-"));
        assert_eq!(row[METERINGS_COUNT], json!("-"));
    }

    #[test]
    fn grouped_glucose_is_time_weighted() {
        // 2024-05-01: 4.0 at 00:00, 8.0 at 12:00, 4.0 at 24:00 (next day's first)
        let mut a = record(3, at(2024, 5, 2, 0, 0));
        a.meterings.push(level("4.0"));
        let mut b = record(2, at(2024, 5, 1, 12, 0));
        b.meterings.push(level("8.0"));
        let mut c = record(1, at(2024, 5, 1, 0, 0));
        c.meterings.push(level("4.0"));

        let report = assemble(&[a, b, c], Granularity::Day, &utc(), &NoContext).unwrap();
        let row = serde_json::to_value(&report.rows[1]).unwrap();
        assert_eq!(row[TIME_LABEL], json!("2024-05-01"));
        assert_eq!(row[SUGAR_LEVEL], json!("6.00"));
        assert_eq!(row[MAX_SUGAR], json!("8.0"));
        assert_eq!(row[MIN_SUGAR], json!("4.0"));
        assert_eq!(row[METERINGS_COUNT], json!(2));
    }

    #[test]
    fn lone_metering_reports_its_own_value() {
        let mut a = record(1, at(2024, 5, 1, 7, 0));
        a.meterings.push(level("7.3"));

        let report = assemble(&[a], Granularity::Week, &utc(), &NoContext).unwrap();
        let row = serde_json::to_value(&report.rows[0]).unwrap();
        assert_eq!(row[SUGAR_LEVEL], json!("7.30"));
        assert_eq!(row[MAX_SUGAR], json!("7.3"));
        assert_eq!(row[METERINGS_COUNT], json!(1));
    }

    #[test]
    fn ungrouped_rows_show_the_raw_metering() {
        let mut a = record(2, at(2022, 2, 6, 22, 0));
        a.meterings.push(level("4.0"));
        let b = record(1, at(2022, 2, 6, 12, 30));

        let report = assemble(&[a, b], Granularity::None, &utc(), &NoContext).unwrap();
        let data_indices: Vec<&str> = report
            .columns
            .iter()
            .map(|c| c.data_index.as_str())
            .collect();
        assert_eq!(data_indices, vec![TIME_LABEL, SUGAR_LEVEL, MEAL]);

        let rows = serde_json::to_value(&report.rows).unwrap();
        assert_eq!(
            rows,
            json!([
                {"time_label": "2022-02-06 22:00", "sugar_level": "4.0", "meal": null},
                {"time_label": "2022-02-06 12:30", "sugar_level": null, "meal": null},
            ])
        );
    }
}
