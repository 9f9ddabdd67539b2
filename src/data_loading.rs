use crate::{Injection, Level, Record};
use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, Int64Array, StringArray};
use arrow::ipc::reader::FileReaderBuilder;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, info};
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use walkdir::WalkDir;

pub const CSV_DELIMITER: u8 = b';';
pub const CSV_QUOTE: u8 = b'"';

/// What an export row attaches to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// The record alone, no attachment.
    Bare,
    Metering,
    Meal,
    Injection,
    Comment,
}

impl FromStr for AttachmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "record" => Ok(AttachmentKind::Bare),
            "metering" => Ok(AttachmentKind::Metering),
            "meal" => Ok(AttachmentKind::Meal),
            "injection" => Ok(AttachmentKind::Injection),
            "comment" => Ok(AttachmentKind::Comment),
            other => Err(format!(
                "Invalid attachment kind: {}. Use metering, meal, injection, comment or leave it empty",
                other
            )),
        }
    }
}

/// One line of a diary export: a record joined with at most one attachment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportRow {
    pub record_id: i64,
    pub when: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub insulin_kind: Option<String>,
}

/// Parses RFC 3339, or a naive `%Y-%m-%d %H:%M[:%S]` taken as local time in `tz`.
pub fn parse_when<Tz: TimeZone>(raw: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Failed to parse timestamp: {}", raw))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("Local time {} does not exist in the configured zone", raw))
}

/// Merges export rows into records keyed by `record_id`.
#[derive(Debug, Default)]
pub struct RecordAccumulator {
    records: BTreeMap<i64, Record>,
}

impl RecordAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push<Tz: TimeZone>(&mut self, row: ExportRow, tz: &Tz) -> Result<()> {
        let when = parse_when(&row.when, tz)?;
        let kind: AttachmentKind = row.kind.parse().map_err(|e: String| anyhow!(e))?;

        let record = match self.records.entry(row.record_id) {
            Entry::Vacant(slot) => slot.insert(Record::new(row.record_id, when)),
            Entry::Occupied(slot) => {
                let record = slot.into_mut();
                if record.when != when {
                    bail!(
                        "Record {} appears at {} and at {}",
                        row.record_id,
                        record.when,
                        when
                    );
                }
                record
            }
        };

        let value = row.value.as_deref().map(str::trim);
        match kind {
            AttachmentKind::Bare => {}
            AttachmentKind::Metering => record.meterings.push(parse_level(value, "metering")?),
            AttachmentKind::Meal => record.meals.push(parse_level(value, "meal")?),
            AttachmentKind::Injection => {
                let insulin_kind = row
                    .insulin_kind
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| anyhow!("Injection without insulin kind"))?;
                let quantity = match value.filter(|v| !v.is_empty()) {
                    Some(v) => Some(
                        v.parse::<u32>()
                            .with_context(|| format!("Invalid insulin quantity: {}", v))?,
                    ),
                    None => None,
                };
                record.injections.push(Injection {
                    kind: insulin_kind.to_string(),
                    quantity,
                });
            }
            AttachmentKind::Comment => {
                let content = row
                    .value
                    .ok_or_else(|| anyhow!("Comment without content"))?;
                record.comments.push(content);
            }
        }
        Ok(())
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records.into_values().collect()
    }
}

fn parse_level(value: Option<&str>, what: &str) -> Result<Level> {
    let raw = value.ok_or_else(|| anyhow!("{} without value", what))?;
    raw.parse::<Level>()
        .with_context(|| format!("Invalid {} value: {}", what, raw))
}

pub fn read_csv_file<Tz: TimeZone>(
    path: &Path,
    tz: &Tz,
    records: &mut RecordAccumulator,
) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(CSV_DELIMITER)
        .quote(CSV_QUOTE)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mut rows = 0;
    for (idx, result) in rdr.deserialize::<ExportRow>().enumerate() {
        // header is line 1
        let line = idx + 2;
        let row = result.with_context(|| format!("{}:{}", path.display(), line))?;
        records
            .push(row, tz)
            .with_context(|| format!("{}:{}", path.display(), line))?;
        rows += 1;
    }
    Ok(rows)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a StringArray>> {
    match batch.column_by_name(name) {
        None => Ok(None),
        Some(column) => column
            .as_any()
            .downcast_ref::<StringArray>()
            .map(Some)
            .ok_or_else(|| anyhow!("{} column should be strings", name)),
    }
}

fn string_value(column: Option<&StringArray>, row: usize) -> Option<String> {
    column
        .filter(|c| !c.is_null(row))
        .map(|c| c.value(row).to_string())
}

pub fn read_feather_file<Tz: TimeZone>(
    path: &Path,
    tz: &Tz,
    records: &mut RecordAccumulator,
) -> Result<usize> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = FileReaderBuilder::new().build(file)?;
    let mut rows = 0;

    for batch in reader {
        let batch = batch?;

        let id_col = batch
            .column_by_name("record_id")
            .ok_or_else(|| anyhow!("record_id column missing"))?
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| anyhow!("record_id column should be i64"))?;
        let when_col =
            string_column(&batch, "when")?.ok_or_else(|| anyhow!("when column missing"))?;
        let kind_col = string_column(&batch, "kind")?;
        let value_col = string_column(&batch, "value")?;
        let insulin_col = string_column(&batch, "insulin_kind")?;

        for row in 0..batch.num_rows() {
            if id_col.is_null(row) || when_col.is_null(row) {
                bail!("{}: row {} has no record_id or when", path.display(), rows + 1);
            }
            let export_row = ExportRow {
                record_id: id_col.value(row),
                when: when_col.value(row).to_string(),
                kind: string_value(kind_col, row).unwrap_or_default(),
                value: string_value(value_col, row),
                insulin_kind: string_value(insulin_col, row),
            };
            records
                .push(export_row, tz)
                .with_context(|| format!("{}: row {}", path.display(), rows + 1))?;
            rows += 1;
        }
    }

    Ok(rows)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(ext))
}

/// Loads a single export file, or every `.csv`/`.feather` file below a directory.
pub fn load_records<Tz: TimeZone>(input: &Path, tz: &Tz) -> Result<Vec<Record>> {
    let mut records = RecordAccumulator::new();

    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                load_file(entry.path(), tz, &mut records)?;
            }
        }
    } else {
        load_file(input, tz, &mut records)?;
    }

    info!(
        "Loaded {} records from {}",
        records.len(),
        input.display()
    );
    Ok(records.into_records())
}

fn load_file<Tz: TimeZone>(path: &Path, tz: &Tz, records: &mut RecordAccumulator) -> Result<()> {
    let rows = if has_extension(path, "csv") {
        read_csv_file(path, tz, records)?
    } else if has_extension(path, "feather") || has_extension(path, "arrow") {
        read_feather_file(path, tz, records)?
    } else {
        debug!("Skipping {}", path.display());
        return Ok(());
    };
    info!("Loading file: {} ({} rows)", path.display(), rows);
    Ok(())
}
