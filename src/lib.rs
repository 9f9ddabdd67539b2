pub mod averaging;
pub mod config;
pub mod data_loading;
pub mod error;
pub mod grouping;
pub mod interpolation;
pub mod listing;
pub mod output;
pub mod pagination;
pub mod report;
pub mod response;
pub mod store;

use chrono::{DateTime, TimeZone, Utc};
use error::LevelError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// A `decimal(3,1)` quantity: blood sugar in mmol/l or a meal in bread units.
///
/// Stored as a whole number of tenths so sums stay exact and the display
/// always carries exactly one decimal digit (`8.0`, `10.5`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level {
    tenths: i32,
}

impl Level {
    pub const ZERO: Level = Level { tenths: 0 };

    pub fn from_tenths(tenths: i32) -> Self {
        Self { tenths }
    }

    pub fn tenths(self) -> i32 {
        self.tenths
    }

    pub fn to_f64(self) -> f64 {
        self.tenths as f64 / 10.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tenths < 0 { "-" } else { "" };
        let abs = self.tenths.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

impl FromStr for Level {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LevelError::Empty);
        }

        let normalized = trimmed.replace(',', ".");
        let (int_part, frac_part) = match normalized.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (normalized.as_str(), ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(LevelError::Invalid(trimmed.to_string()));
        }
        if frac_part.len() > 1 {
            return Err(LevelError::TooPrecise(trimmed.to_string()));
        }

        let whole: i32 = int_part
            .parse()
            .map_err(|_| LevelError::Overflow(trimmed.to_string()))?;
        let tenth: i32 = frac_part.parse().unwrap_or(0);
        whole
            .checked_mul(10)
            .and_then(|t| t.checked_add(tenth))
            .map(Level::from_tenths)
            .ok_or_else(|| LevelError::Overflow(trimmed.to_string()))
    }
}

impl Add for Level {
    type Output = Level;

    fn add(self, rhs: Level) -> Level {
        Level::from_tenths(self.tenths.saturating_add(rhs.tenths))
    }
}

impl Sum for Level {
    fn sum<I: Iterator<Item = Level>>(iter: I) -> Level {
        iter.fold(Level::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Level> for Level {
    fn sum<I: Iterator<Item = &'a Level>>(iter: I) -> Level {
        iter.copied().sum()
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Injection {
    pub kind: String,
    /// Units injected; unknown when the diary entry left it blank.
    pub quantity: Option<u32>,
}

/// One diary entry together with everything attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub when: DateTime<Utc>,
    pub meterings: Vec<Level>,
    pub meals: Vec<Level>,
    pub injections: Vec<Injection>,
    pub comments: Vec<String>,
}

impl Record {
    pub fn new(id: i64, when: DateTime<Utc>) -> Self {
        Self {
            id,
            when,
            meterings: Vec::new(),
            meals: Vec::new(),
            injections: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn local_when<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Tz> {
        self.when.with_timezone(tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn level_parses_and_displays_one_decimal() {
        assert_eq!("8".parse::<Level>().unwrap().to_string(), "8.0");
        assert_eq!("10.5".parse::<Level>().unwrap().to_string(), "10.5");
        assert_eq!(" 4,2 ".parse::<Level>().unwrap().to_string(), "4.2");
        assert_eq!("0.3".parse::<Level>().unwrap().tenths(), 3);
    }

    #[test]
    fn level_rejects_garbage() {
        assert_matches!("".parse::<Level>(), Err(LevelError::Empty));
        assert_matches!("abc".parse::<Level>(), Err(LevelError::Invalid(_)));
        assert_matches!(".5".parse::<Level>(), Err(LevelError::Invalid(_)));
        assert_matches!("-1.0".parse::<Level>(), Err(LevelError::Invalid(_)));
        assert_matches!("4.25".parse::<Level>(), Err(LevelError::TooPrecise(_)));
        assert_matches!("99999999999".parse::<Level>(), Err(LevelError::Overflow(_)));
    }

    #[test]
    fn level_sums_exactly() {
        let total: Level = ["0.1", "0.2", "2.7"]
            .iter()
            .map(|s| s.parse::<Level>().unwrap())
            .sum();
        assert_eq!(total.to_string(), "3.0");
        assert_eq!(serde_json::to_string(&total).unwrap(), "\"3.0\"");
    }

    #[test]
    fn level_sum_saturates() {
        let huge = Level::from_tenths(i32::MAX - 5);
        let total: Level = [huge, Level::from_tenths(10)].iter().sum();
        assert_eq!(total.tenths(), i32::MAX);
    }
}
