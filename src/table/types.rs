//! Column-oriented observation table.
//!
//! The builder consumes this structure instead of a dataframe. Each column
//! is named and homogeneously typed; all columns share one row count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Errors raised while constructing or loading a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{column}' row {row}: cannot parse '{value}' as {expected}")]
    ParseError {
        column: String,
        row: usize,
        value: String,
        expected: &'static str,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Values stored in a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnValues {
    Text(Vec<String>),
    Integer(Vec<i64>),
    Float(Vec<f64>),
    Timestamp(Vec<DateTime<Utc>>),
}

impl ColumnValues {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the stored type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValues::Text(_) => "text",
            ColumnValues::Integer(_) => "integer",
            ColumnValues::Float(_) => "float",
            ColumnValues::Timestamp(_) => "timestamp",
        }
    }

    /// Whether the column can be coerced to `f64`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnValues::Integer(_) | ColumnValues::Float(_))
    }

    /// Numeric value at `row`, if the column is numeric.
    pub fn numeric_at(&self, row: usize) -> Option<f64> {
        match self {
            ColumnValues::Integer(v) => v.get(row).map(|&x| x as f64),
            ColumnValues::Float(v) => v.get(row).copied(),
            _ => None,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> Self {
        Self::new(
            name,
            ColumnValues::Text(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn integer(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(name, ColumnValues::Integer(values))
    }

    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnValues::Float(values))
    }

    pub fn timestamp(name: impl Into<String>, values: Vec<DateTime<Utc>>) -> Self {
        Self::new(name, ColumnValues::Timestamp(values))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Identifier of a longitudinal unit.
///
/// Integer ids order numerically, text ids lexicographically. A single
/// table never mixes the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectKey {
    Integer(i64),
    Text(String),
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKey::Integer(id) => write!(f, "{id}"),
            SubjectKey::Text(id) => write!(f, "{id}"),
        }
    }
}

/// An ordered set of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    columns: Vec<Column>,
}

impl ObservationTable {
    /// Build a table, validating column names and lengths.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }

        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(TableError::LengthMismatch {
                    column: bad.name.clone(),
                    expected,
                    actual: bad.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    /// Number of rows (zero for a table without columns).
    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Return a copy of the table with rows reordered by `order`.
    ///
    /// Every index in `order` must be a valid row index.
    pub fn take_rows(&self, order: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = match &c.values {
                    ColumnValues::Text(v) => {
                        ColumnValues::Text(order.iter().map(|&i| v[i].clone()).collect())
                    }
                    ColumnValues::Integer(v) => {
                        ColumnValues::Integer(order.iter().map(|&i| v[i]).collect())
                    }
                    ColumnValues::Float(v) => {
                        ColumnValues::Float(order.iter().map(|&i| v[i]).collect())
                    }
                    ColumnValues::Timestamp(v) => {
                        ColumnValues::Timestamp(order.iter().map(|&i| v[i]).collect())
                    }
                };
                Column::new(c.name.clone(), values)
            })
            .collect();
        Self { columns }
    }
}
