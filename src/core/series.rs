//! Ordering of observations into subject series.
//!
//! Rows are sorted by subject, then by time, then by their original
//! position. Consecutive rows sharing a subject form that subject's series.

use crate::core::pairing::{BuildError, ElapsedUnit};
use crate::table::{Column, ColumnValues, SubjectKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Range;

/// A single point on the time axis of a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimePoint {
    Instant(DateTime<Utc>),
    Numeric(f64),
}

/// Borrowed view of the timestamp column.
#[derive(Debug, Clone)]
pub enum TimeAxis<'a> {
    /// Calendar timestamps; differences are expressed in an [`ElapsedUnit`].
    Instants(&'a [DateTime<Utc>]),
    /// Plain numbers (e.g. study day); differences are taken as-is.
    Numeric(Vec<f64>),
}

impl<'a> TimeAxis<'a> {
    /// Interpret a column as a time axis.
    pub fn from_column(column: &'a Column) -> Result<Self, BuildError> {
        match &column.values {
            ColumnValues::Timestamp(values) => Ok(TimeAxis::Instants(values)),
            ColumnValues::Integer(values) => {
                Ok(TimeAxis::Numeric(values.iter().map(|&v| v as f64).collect()))
            }
            ColumnValues::Float(values) => Ok(TimeAxis::Numeric(values.clone())),
            other => Err(BuildError::TypeMismatch {
                column: column.name.clone(),
                expected: "timestamp or numeric",
                actual: other.type_name(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TimeAxis::Instants(values) => values.len(),
            TimeAxis::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the axis holds calendar timestamps.
    pub fn is_calendar(&self) -> bool {
        matches!(self, TimeAxis::Instants(_))
    }

    pub fn point(&self, row: usize) -> TimePoint {
        match self {
            TimeAxis::Instants(values) => TimePoint::Instant(values[row]),
            TimeAxis::Numeric(values) => TimePoint::Numeric(values[row]),
        }
    }

    /// Numeric times can be NaN; calendar times never are.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            TimeAxis::Instants(_) => false,
            TimeAxis::Numeric(values) => values[row].is_nan(),
        }
    }

    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            TimeAxis::Instants(values) => values[a].cmp(&values[b]),
            TimeAxis::Numeric(values) => values[a].total_cmp(&values[b]),
        }
    }

    /// Time elapsed from row `prev` to row `curr`.
    pub fn elapsed(&self, prev: usize, curr: usize, unit: ElapsedUnit) -> f64 {
        match self {
            TimeAxis::Instants(values) => {
                let millis = (values[curr] - values[prev]).num_milliseconds() as f64;
                millis / 1000.0 / unit.seconds()
            }
            TimeAxis::Numeric(values) => values[curr] - values[prev],
        }
    }
}

/// Read the subject column as keys.
pub fn subject_keys(column: &Column) -> Result<Vec<SubjectKey>, BuildError> {
    match &column.values {
        ColumnValues::Text(values) => Ok(values.iter().cloned().map(SubjectKey::Text).collect()),
        ColumnValues::Integer(values) => {
            Ok(values.iter().copied().map(SubjectKey::Integer).collect())
        }
        other => Err(BuildError::TypeMismatch {
            column: column.name.clone(),
            expected: "text or integer",
            actual: other.type_name(),
        }),
    }
}

/// Row indices ordered by (subject, time), ties kept in original order.
pub fn sort_order(subjects: &[SubjectKey], times: &TimeAxis<'_>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..subjects.len()).collect();
    // sort_by is stable, so equal keys keep their input order
    order.sort_by(|&a, &b| {
        subjects[a]
            .cmp(&subjects[b])
            .then_with(|| times.compare(a, b))
    });
    order
}

/// A contiguous block of `order` belonging to one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRun {
    pub subject: SubjectKey,
    /// Positions into the sorted order, not raw row indices.
    pub span: Range<usize>,
}

impl SubjectRun {
    pub fn len(&self) -> usize {
        self.span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }
}

/// Split a sorted order into per-subject runs.
pub fn subject_runs(order: &[usize], subjects: &[SubjectKey]) -> Vec<SubjectRun> {
    let mut runs: Vec<SubjectRun> = Vec::new();

    for (pos, &row) in order.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.subject == subjects[row] => run.span.end = pos + 1,
            _ => runs.push(SubjectRun {
                subject: subjects[row].clone(),
                span: pos..pos + 1,
            }),
        }
    }

    runs
}
