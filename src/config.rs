use crate::grouping::Granularity;
use chrono::FixedOffset;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Parses `+03:00`, `-0530`, `+5` or `Z` into a fixed UTC offset.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "Invalid zero offset".to_string());
    }

    let invalid = || {
        format!(
            "Invalid UTC offset: {}. Use a signed offset such as +03:00 or -05:30",
            s
        )
    };
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parses an IANA zone name such as `Europe/Berlin`.
pub fn parse_time_zone(s: &str) -> Result<Tz, String> {
    s.trim().parse::<Tz>().map_err(|e| {
        format!(
            "Invalid time zone: {}. Use an IANA name such as Europe/Berlin ({})",
            s, e
        )
    })
}

/// Zone the diary's local calendar is computed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiaryZone {
    Named(Tz),
    Fixed(FixedOffset),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Report rows grouped by period, with glucose averages and totals
    Rows {
        /// Grouping period: none, day, week, month or year
        #[arg(long, default_value = "day")]
        groupping: Granularity,
    },
    /// Plain records with their attachments
    Records,
}

/// Build paged diary reports from exported records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Export file (.csv or .feather) or a directory of them
    #[arg(help = "Export file (.csv or .feather) or a directory of them")]
    pub input_path: PathBuf,

    /// IANA time zone of the diary, e.g. Europe/Berlin; overrides --utc-offset
    #[arg(long, env = "SUGAR_TIME_ZONE", value_parser = parse_time_zone)]
    pub time_zone: Option<Tz>,

    /// Offset of the diary's local time from UTC, used without --time-zone
    #[arg(long, env = "SUGAR_UTC_OFFSET", default_value = "+00:00", value_parser = parse_utc_offset, allow_hyphen_values = true)]
    pub utc_offset: FixedOffset,

    /// Pretty-print the JSON output and keep non-ASCII characters as is
    #[arg(long, env = "SUGAR_DEBUG")]
    pub debug: bool,

    /// Rows (or records) per page
    #[arg(long, default_value = "200")]
    pub page_size: NonZeroUsize,

    /// Page to show, -1 for the last one
    #[arg(long, default_value = "1", allow_negative_numbers = true)]
    pub page_number: i64,

    /// Write the JSON here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn zone(&self) -> DiaryZone {
        match self.time_zone {
            Some(tz) => DiaryZone::Named(tz),
            None => DiaryZone::Fixed(self.utc_offset),
        }
    }
}
