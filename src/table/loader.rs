//! CSV loading into an [`ObservationTable`].
//!
//! The subject column becomes integer ids when every cell parses as one,
//! text otherwise. The timestamp column is parsed according to
//! [`TimestampKind`]. Every other column is read as `f64` (empty cells become
//! NaN); a column with any non-numeric cell is kept as text so the builder
//! can report it.

use crate::table::types::{Column, ColumnValues, ObservationTable, TableError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Naive datetime layouts accepted after RFC 3339 fails.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// How the timestamp column is encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampKind {
    /// RFC 3339, naive datetime, or plain date
    #[default]
    Datetime,
    /// A number such as study day or hours since enrolment
    Numeric,
}

impl fmt::Display for TimestampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampKind::Datetime => f.write_str("datetime"),
            TimestampKind::Numeric => f.write_str("numeric"),
        }
    }
}

impl FromStr for TimestampKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "datetime" | "date" | "timestamp" => Ok(TimestampKind::Datetime),
            "numeric" | "number" => Ok(TimestampKind::Numeric),
            other => Err(format!("unknown timestamp kind: {other}")),
        }
    }
}

/// Reads observation tables from delimited text.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    subject_column: String,
    timestamp_column: String,
    timestamp_kind: TimestampKind,
    timezone: Tz,
    delimiter: u8,
}

impl CsvLoader {
    pub fn new(subject_column: impl Into<String>, timestamp_column: impl Into<String>) -> Self {
        Self {
            subject_column: subject_column.into(),
            timestamp_column: timestamp_column.into(),
            timestamp_kind: TimestampKind::default(),
            timezone: Tz::UTC,
            delimiter: b',',
        }
    }

    pub fn with_timestamp_kind(mut self, kind: TimestampKind) -> Self {
        self.timestamp_kind = kind;
        self
    }

    /// Zone used for timestamps without an offset.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a table from a file.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ObservationTable, TableError> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Loading observations");
        self.read(file)
    }

    /// Load a table from any reader.
    pub fn read<R: Read>(&self, reader: R) -> Result<ObservationTable, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        for record in reader.records() {
            let record = record?;
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| -> Result<Column, TableError> {
                let values = if name == self.subject_column {
                    parse_subjects(raw)
                } else if name == self.timestamp_column {
                    self.parse_times(&name, raw)?
                } else {
                    parse_features(raw)
                };
                Ok(Column::new(name, values))
            })
            .collect::<Result<Vec<_>, TableError>>()?;

        let table = ObservationTable::new(columns)?;
        debug!(
            rows = table.row_count(),
            columns = table.columns().len(),
            "Loaded observations"
        );
        Ok(table)
    }

    fn parse_times(&self, name: &str, raw: Vec<String>) -> Result<ColumnValues, TableError> {
        let parse_error = |row: usize, value: &str, expected: &'static str| TableError::ParseError {
            column: name.to_string(),
            row,
            value: value.to_string(),
            expected,
        };

        match self.timestamp_kind {
            TimestampKind::Numeric => raw
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    parse_float(value).ok_or_else(|| parse_error(row, value, "number"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ColumnValues::Float),
            TimestampKind::Datetime => raw
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    parse_datetime(value, self.timezone)
                        .ok_or_else(|| parse_error(row, value, "datetime"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ColumnValues::Timestamp),
        }
    }
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self::new("subject_id", "timestamp")
    }
}

/// Integer ids only when every cell is the canonical form of its number,
/// so "01" and "1" stay distinct subjects.
fn parse_subjects(raw: Vec<String>) -> ColumnValues {
    let ids: Option<Vec<i64>> = raw
        .iter()
        .map(|v| v.parse::<i64>().ok().filter(|id| id.to_string() == *v))
        .collect();
    match ids {
        Some(ids) if !ids.is_empty() => ColumnValues::Integer(ids),
        _ => ColumnValues::Text(raw),
    }
}

fn parse_features(raw: Vec<String>) -> ColumnValues {
    let values: Option<Vec<f64>> = raw.iter().map(|v| parse_float(v)).collect();
    match values {
        Some(values) => ColumnValues::Float(values),
        None => ColumnValues::Text(raw),
    }
}

/// Parse a float, mapping empty and `NA`-style cells to NaN.
fn parse_float(value: &str) -> Option<f64> {
    match value {
        "" | "NA" | "NaN" | "nan" | "null" => Some(f64::NAN),
        v => v.parse::<f64>().ok(),
    }
}

/// Parse RFC 3339, then naive datetimes and dates in `timezone`.
pub fn parse_datetime(value: &str, timezone: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
