//! Lag-1 pair construction.
//!
//! Every observation is paired with the observation that immediately
//! precedes it for the same subject. The first observation of each subject
//! has no predecessor and produces no row. `X` and `Y` are built from the
//! same surviving pairs, so they always have the same number of rows.

use crate::core::matrix::{assemble, FeatureLayout, PairIndex, PairingStats, SupervisedData};
use crate::core::series::{sort_order, subject_keys, subject_runs, TimeAxis};
use crate::table::{Column, ObservationTable};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors produced by the pair builder.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Column '{column}' has type {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("No subject has two or more observations ({records} records, {subjects} subjects)")]
    EmptyResult { records: usize, subjects: usize },
}

/// Unit for elapsed time between calendar timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElapsedUnit {
    Seconds,
    Minutes,
    Hours,
    #[default]
    Days,
}

impl ElapsedUnit {
    /// Length of one unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            ElapsedUnit::Seconds => 1.0,
            ElapsedUnit::Minutes => 60.0,
            ElapsedUnit::Hours => 3_600.0,
            ElapsedUnit::Days => 86_400.0,
        }
    }
}

impl fmt::Display for ElapsedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElapsedUnit::Seconds => "seconds",
            ElapsedUnit::Minutes => "minutes",
            ElapsedUnit::Hours => "hours",
            ElapsedUnit::Days => "days",
        };
        f.write_str(name)
    }
}

impl FromStr for ElapsedUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "seconds" => Ok(ElapsedUnit::Seconds),
            "m" | "min" | "minutes" => Ok(ElapsedUnit::Minutes),
            "h" | "hours" => Ok(ElapsedUnit::Hours),
            "d" | "days" => Ok(ElapsedUnit::Days),
            other => Err(format!("unknown elapsed unit: {other}")),
        }
    }
}

/// What to do with rows that contain NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Fail on the first missing value
    #[default]
    Reject,
    /// Skip every pair that touches a row with a missing value
    DropPair,
}

/// Configuration for the pair builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Column holding the subject identifier
    #[serde(default = "default_subject_column")]
    pub subject_column: String,

    /// Column holding the observation time
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Explicit feature columns; all remaining columns when unset
    #[serde(default)]
    pub feature_columns: Option<Vec<String>>,

    #[serde(default)]
    pub layout: FeatureLayout,

    #[serde(default)]
    pub elapsed_unit: ElapsedUnit,

    #[serde(default)]
    pub missing_values: MissingPolicy,

    /// Whether zero pairs is a valid result
    #[serde(default = "default_true")]
    pub allow_empty: bool,
}

fn default_subject_column() -> String {
    "subject_id".to_string()
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            subject_column: default_subject_column(),
            timestamp_column: default_timestamp_column(),
            feature_columns: None,
            layout: FeatureLayout::default(),
            elapsed_unit: ElapsedUnit::default(),
            missing_values: MissingPolicy::default(),
            allow_empty: true,
        }
    }
}

impl PairingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject_column(mut self, name: impl Into<String>) -> Self {
        self.subject_column = name.into();
        self
    }

    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column = name.into();
        self
    }

    pub fn with_feature_columns(mut self, names: Vec<String>) -> Self {
        self.feature_columns = Some(names);
        self
    }

    pub fn with_layout(mut self, layout: FeatureLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_elapsed_unit(mut self, unit: ElapsedUnit) -> Self {
        self.elapsed_unit = unit;
        self
    }

    pub fn with_missing_values(mut self, policy: MissingPolicy) -> Self {
        self.missing_values = policy;
        self
    }

    pub fn with_allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }
}

/// Builds lag-1 supervised pairs from an observation table.
#[derive(Debug, Clone, Default)]
pub struct LagPairBuilder {
    config: PairingConfig,
}

impl LagPairBuilder {
    pub fn new(config: PairingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Build `(X, Y)` from `table`.
    ///
    /// The table is left untouched; the returned matrices are fresh
    /// allocations.
    pub fn build(&self, table: &ObservationTable) -> Result<SupervisedData, BuildError> {
        let config = &self.config;

        let subject_column = self.require_column(table, &config.subject_column, "subject")?;
        let time_column = self.require_column(table, &config.timestamp_column, "timestamp")?;
        let feature_columns = self.resolve_features(table)?;

        let subjects = subject_keys(subject_column)?;
        let times = TimeAxis::from_column(time_column)?;
        let features = feature_matrix(&feature_columns, table.row_count());
        let missing = self.missing_rows(&features, &feature_columns, &times, time_column)?;

        let order = sort_order(&subjects, &times);
        let runs = subject_runs(&order, &subjects);
        debug!(
            records = order.len(),
            subjects = runs.len(),
            features = feature_columns.len(),
            "Sorted observations"
        );

        let mut stats = PairingStats {
            records: order.len(),
            subjects: runs.len(),
            ..PairingStats::default()
        };
        let mut pairs = Vec::with_capacity(order.len().saturating_sub(runs.len()));

        for run in &runs {
            if run.len() < 2 {
                stats.singleton_subjects += 1;
                continue;
            }

            let rows = &order[run.span.clone()];
            for window in rows.windows(2) {
                let (prev, curr) = (window[0], window[1]);

                if times.compare(prev, curr) == Ordering::Equal {
                    stats.duplicate_timestamps += 1;
                }

                if missing[prev] || missing[curr] {
                    stats.dropped_pairs += 1;
                    continue;
                }

                pairs.push(PairIndex {
                    subject: run.subject.clone(),
                    previous_row: prev,
                    current_row: curr,
                    previous_time: times.point(prev),
                    current_time: times.point(curr),
                    elapsed: times.elapsed(prev, curr, config.elapsed_unit),
                });
            }
        }
        stats.pairs = pairs.len();

        if stats.singleton_subjects > 0 {
            warn!(
                count = stats.singleton_subjects,
                "Subjects with a single observation contribute no pairs"
            );
        }
        if stats.duplicate_timestamps > 0 {
            warn!(
                count = stats.duplicate_timestamps,
                "Repeated timestamps within a subject; kept in input order"
            );
        }
        if stats.dropped_pairs > 0 {
            warn!(count = stats.dropped_pairs, "Dropped pairs with missing values");
        }

        if pairs.is_empty() && !config.allow_empty {
            return Err(BuildError::EmptyResult {
                records: stats.records,
                subjects: stats.subjects,
            });
        }

        let (x, y) = assemble(&features, &pairs, config.layout);

        let feature_names: Vec<String> = feature_columns.iter().map(|c| c.name.clone()).collect();
        let elapsed_name = if times.is_calendar() {
            format!("elapsed_{}", config.elapsed_unit)
        } else {
            "elapsed".to_string()
        };

        info!(
            pairs = stats.pairs,
            subjects = stats.subjects,
            x_cols = x.ncols(),
            y_cols = y.ncols(),
            layout = %config.layout,
            "Built supervised pairs"
        );

        Ok(SupervisedData {
            x,
            y,
            x_columns: config.layout.column_names(&elapsed_name, &feature_names),
            y_columns: feature_names,
            pairs,
            layout: config.layout,
            stats,
        })
    }

    fn require_column<'t>(
        &self,
        table: &'t ObservationTable,
        name: &str,
        role: &str,
    ) -> Result<&'t Column, BuildError> {
        table.column(name).ok_or_else(|| {
            BuildError::InvalidInput(format!("{role} column '{name}' not found in table"))
        })
    }

    /// Feature columns in table order, or in the configured order.
    fn resolve_features<'t>(
        &self,
        table: &'t ObservationTable,
    ) -> Result<Vec<&'t Column>, BuildError> {
        let config = &self.config;

        let columns: Vec<&Column> = match &config.feature_columns {
            Some(names) => names
                .iter()
                .map(|name| self.require_column(table, name, "feature"))
                .collect::<Result<_, _>>()?,
            None => table
                .columns()
                .iter()
                .filter(|c| c.name != config.subject_column && c.name != config.timestamp_column)
                .collect(),
        };

        if columns.is_empty() {
            return Err(BuildError::InvalidInput(
                "table has no feature columns".to_string(),
            ));
        }

        if let Some(key) = columns
            .iter()
            .find(|c| c.name == config.subject_column || c.name == config.timestamp_column)
        {
            return Err(BuildError::InvalidInput(format!(
                "column '{}' cannot be both a key and a feature",
                key.name
            )));
        }

        if let Some(bad) = columns.iter().find(|c| !c.values.is_numeric()) {
            return Err(BuildError::TypeMismatch {
                column: bad.name.clone(),
                expected: "numeric",
                actual: bad.values.type_name(),
            });
        }

        Ok(columns)
    }

    /// Flag rows with NaN, or fail under [`MissingPolicy::Reject`].
    fn missing_rows(
        &self,
        features: &Array2<f64>,
        columns: &[&Column],
        times: &TimeAxis<'_>,
        time_column: &Column,
    ) -> Result<Vec<bool>, BuildError> {
        let mut missing = vec![false; features.nrows()];

        for (row, flag) in missing.iter_mut().enumerate() {
            let bad_feature = features.row(row).iter().position(|v| v.is_nan());
            let bad_time = times.is_missing(row);
            if bad_feature.is_none() && !bad_time {
                continue;
            }

            if self.config.missing_values == MissingPolicy::Reject {
                let column = match bad_feature {
                    Some(j) => columns[j].name.clone(),
                    None => time_column.name.clone(),
                };
                return Err(BuildError::MissingValue { column, row });
            }
            *flag = true;
        }

        Ok(missing)
    }
}

/// Copy numeric feature columns into a row-major matrix.
fn feature_matrix(columns: &[&Column], rows: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, columns.len()), |(i, j)| {
        columns[j].values.numeric_at(i).unwrap_or(f64::NAN)
    })
}

/// Build supervised pairs with the given configuration.
pub fn build_supervised(
    table: &ObservationTable,
    config: &PairingConfig,
) -> Result<SupervisedData, BuildError> {
    LagPairBuilder::new(config.clone()).build(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnValues;
    use ndarray::array;

    fn abundance_table() -> ObservationTable {
        ObservationTable::new(vec![
            Column::text("subject_id", vec!["B", "A", "A", "B", "A"]),
            Column::float("timestamp", vec![0.0, 2.0, 0.0, 3.0, 1.0]),
            Column::float("taxon", vec![10.0, 3.0, 1.0, 20.0, 2.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_single_subject_scenario() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "A", "A"]),
            Column::integer("timestamp", vec![1, 2, 3]),
            Column::float("f", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();

        let data = build_supervised(&table, &PairingConfig::default()).unwrap();
        assert_eq!(data.x, array![[1.0, 1.0], [1.0, 2.0]]);
        assert_eq!(data.y, array![[2.0], [3.0]]);
        assert_eq!(data.x_columns, vec!["elapsed", "f_prev"]);
    }

    #[test]
    fn test_pairs_follow_subject_then_time_order() {
        let config = PairingConfig::new().with_layout(FeatureLayout::LaggedCurrent);
        let data = build_supervised(&abundance_table(), &config).unwrap();

        assert_eq!(
            data.x,
            array![
                [1.0, 1.0, 2.0],
                [1.0, 2.0, 3.0],
                [3.0, 10.0, 20.0],
            ]
        );
        assert_eq!(data.y, array![[2.0], [3.0], [20.0]]);
        assert_eq!(data.pairs[2].previous_row, 0);
        assert_eq!(data.pairs[2].current_row, 3);
        assert_eq!(data.stats.subjects, 2);
    }

    #[test]
    fn test_missing_subject_column() {
        let table = ObservationTable::new(vec![
            Column::float("timestamp", vec![0.0]),
            Column::float("f", vec![1.0]),
        ])
        .unwrap();

        let err = build_supervised(&table, &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::InvalidInput(msg) if msg.contains("subject_id")));
    }

    #[test]
    fn test_no_feature_columns() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A"]),
            Column::float("timestamp", vec![0.0]),
        ])
        .unwrap();

        let err = build_supervised(&table, &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::InvalidInput(_)));
    }

    #[test]
    fn test_non_numeric_feature() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A"]),
            Column::float("timestamp", vec![0.0]),
            Column::text("site", vec!["gut"]),
        ])
        .unwrap();

        let err = build_supervised(&table, &PairingConfig::default()).unwrap_err();
        match err {
            BuildError::TypeMismatch { column, actual, .. } => {
                assert_eq!(column, "site");
                assert_eq!(actual, "text");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_explicit_feature_selection() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "A"]),
            Column::float("timestamp", vec![0.0, 1.0]),
            Column::text("site", vec!["gut", "gut"]),
            Column::float("taxon", vec![0.4, 0.6]),
        ])
        .unwrap();

        let config = PairingConfig::new().with_feature_columns(vec!["taxon".to_string()]);
        let data = build_supervised(&table, &config).unwrap();
        assert_eq!(data.y, array![[0.6]]);

        let config = PairingConfig::new().with_feature_columns(vec!["absent".to_string()]);
        assert!(matches!(
            build_supervised(&table, &config),
            Err(BuildError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_key_column_cannot_be_feature() {
        let config = PairingConfig::new().with_feature_columns(vec!["timestamp".to_string()]);
        assert!(matches!(
            build_supervised(&abundance_table(), &config),
            Err(BuildError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_values_rejected_by_default() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "A"]),
            Column::float("timestamp", vec![0.0, 1.0]),
            Column::float("taxon", vec![0.4, f64::NAN]),
        ])
        .unwrap();

        let err = build_supervised(&table, &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::MissingValue { row: 1, .. }));
    }

    #[test]
    fn test_missing_values_drop_touching_pairs() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "A", "A", "A"]),
            Column::float("timestamp", vec![0.0, 1.0, 2.0, 3.0]),
            Column::float("taxon", vec![0.1, f64::NAN, 0.3, 0.4]),
        ])
        .unwrap();

        let config = PairingConfig::new().with_missing_values(MissingPolicy::DropPair);
        let data = build_supervised(&table, &config).unwrap();
        assert_eq!(data.n_pairs(), 1);
        assert_eq!(data.stats.dropped_pairs, 2);
        assert_eq!(data.y, array![[0.4]]);
    }

    #[test]
    fn test_empty_result_policy() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "B"]),
            Column::float("timestamp", vec![0.0, 0.0]),
            Column::float("taxon", vec![0.5, 0.5]),
        ])
        .unwrap();

        let data = build_supervised(&table, &PairingConfig::default()).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.stats.singleton_subjects, 2);

        let strict = PairingConfig::new().with_allow_empty(false);
        assert!(matches!(
            build_supervised(&table, &strict),
            Err(BuildError::EmptyResult { records: 2, subjects: 2 })
        ));
    }

    #[test]
    fn test_duplicate_timestamps_counted() {
        let table = ObservationTable::new(vec![
            Column::integer("subject_id", vec![7, 7, 7]),
            Column::float("timestamp", vec![1.0, 1.0, 2.0]),
            Column::float("taxon", vec![0.1, 0.2, 0.3]),
        ])
        .unwrap();

        let data = build_supervised(&table, &PairingConfig::default()).unwrap();
        assert_eq!(data.stats.duplicate_timestamps, 1);
        assert_eq!(data.x, array![[0.0, 0.1], [1.0, 0.2]]);
    }

    #[test]
    fn test_integer_features_are_coerced() {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "A"]),
            Column::float("timestamp", vec![0.0, 1.0]),
            Column::new("reads", ColumnValues::Integer(vec![100, 250])),
        ])
        .unwrap();

        let data = build_supervised(&table, &PairingConfig::default()).unwrap();
        assert_eq!(data.y, array![[250.0]]);
    }

    #[test]
    fn test_elapsed_unit_parsing() {
        assert_eq!("days".parse::<ElapsedUnit>().unwrap(), ElapsedUnit::Days);
        assert_eq!("H".parse::<ElapsedUnit>().unwrap(), ElapsedUnit::Hours);
        assert!("fortnights".parse::<ElapsedUnit>().is_err());
    }
}
