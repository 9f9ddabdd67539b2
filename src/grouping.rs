use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset, SubsecRound,
    TimeDelta, TimeZone,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How report rows are grouped in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One row per record.
    None,
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::None,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Year,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::None => "none",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    pub fn is_grouped(self) -> bool {
        self != Granularity::None
    }

    /// Start of the bucket holding `when`, in `when`'s time zone.
    pub fn truncate<Tz: TimeZone>(self, when: &DateTime<Tz>) -> DateTime<Tz> {
        if self == Granularity::None {
            return when.clone().trunc_subsecs(0);
        }
        let tz = when.timezone();
        resolve_local(&tz, self.first_day(when.date_naive()).and_time(NaiveTime::MIN))
    }

    pub fn bucket_for<Tz: TimeZone>(self, when: &DateTime<Tz>) -> Bucket<Tz> {
        let start = self.truncate(when);
        let end = self.bucket_end(&start);
        let label = self.label(&start);
        Bucket { start, end, label }
    }

    fn first_day(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::None | Granularity::Day => date,
            Granularity::Week => {
                date - TimeDelta::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => date - TimeDelta::days(date.day0() as i64),
            Granularity::Year => date - TimeDelta::days(date.ordinal0() as i64),
        }
    }

    fn bucket_end<Tz: TimeZone>(self, start: &DateTime<Tz>) -> DateTime<Tz> {
        let first = start.date_naive();
        let next = match self {
            Granularity::None => return start.clone() + TimeDelta::seconds(1),
            Granularity::Day => first + TimeDelta::days(1),
            Granularity::Week => first + TimeDelta::days(7),
            Granularity::Month => first
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX),
            Granularity::Year => first
                .with_year(first.year() + 1)
                .unwrap_or(NaiveDate::MAX),
        };
        resolve_local(&start.timezone(), next.and_time(NaiveTime::MIN))
    }

    fn label<Tz: TimeZone>(self, start: &DateTime<Tz>) -> String {
        let local = start.naive_local();
        match self {
            Granularity::None => local.format("%Y-%m-%d %H:%M").to_string(),
            Granularity::Day => local.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let week = local.date().iso_week();
                format!("{}; week {}", week.year(), week.week())
            }
            Granularity::Month => local.format("%Y-%m").to_string(),
            Granularity::Year => local.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid groupping: {}. Use one of none, day, week, month, year",
                    s
                )
            })
    }
}

/// Half-open time window `[start, end)` that report rows are grouped into.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub label: String,
}

impl<Tz: TimeZone> Bucket<Tz> {
    pub fn contains<Tz2: TimeZone>(&self, when: &DateTime<Tz2>) -> bool {
        self.start <= *when && *when < self.end
    }
}

/// Quarter-hour steps tried to get out of a skipped stretch of local time:
/// two days, while the longest one in tzdata is the whole day Pacific/Apia
/// dropped on 2011-12-30.
const MAX_GAP_STEPS: usize = 192;

/// Maps a local wall-clock time to an instant. Ambiguous times take the
/// earlier instant, skipped times the first valid quarter hour after them.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    for _ in 0..MAX_GAP_STEPS {
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return resolved;
        }
        candidate += TimeDelta::minutes(15);
    }

    // Unreachable with real zone data. Read the wall clock with the offset
    // in force a day earlier rather than as UTC.
    let earlier = naive - TimeDelta::days(1);
    let offset = tz.offset_from_utc_datetime(&earlier).fix();
    let utc = naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    tz.from_utc_datetime(&utc)
}
