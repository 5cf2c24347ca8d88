//! Supervised matrices assembled from lag-1 pairs.

use crate::core::series::TimePoint;
use crate::table::SubjectKey;
use ndarray::{s, Array2, ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column arrangement of the feature matrix `X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    /// `[elapsed, previous features]`
    #[default]
    ElapsedPrevious,
    /// `[elapsed, previous features, current features]`
    LaggedCurrent,
    /// `[previous features]`
    PreviousOnly,
}

impl FeatureLayout {
    /// Width of `X` for `n_features` feature columns.
    pub fn width(&self, n_features: usize) -> usize {
        match self {
            FeatureLayout::ElapsedPrevious => n_features + 1,
            FeatureLayout::LaggedCurrent => 2 * n_features + 1,
            FeatureLayout::PreviousOnly => n_features,
        }
    }

    pub fn includes_elapsed(&self) -> bool {
        !matches!(self, FeatureLayout::PreviousOnly)
    }

    /// Column offset where the previous-state block starts.
    pub fn previous_offset(&self) -> usize {
        if self.includes_elapsed() {
            1
        } else {
            0
        }
    }

    /// Column names of `X`.
    pub fn column_names(&self, elapsed_name: &str, features: &[String]) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width(features.len()));
        if self.includes_elapsed() {
            names.push(elapsed_name.to_string());
        }
        names.extend(features.iter().map(|f| format!("{f}_prev")));
        if *self == FeatureLayout::LaggedCurrent {
            names.extend(features.iter().cloned());
        }
        names
    }

    /// Write one row of `X` for a pair.
    fn fill_row(
        &self,
        mut out: ArrayViewMut1<'_, f64>,
        elapsed: f64,
        previous: ArrayView1<'_, f64>,
        current: ArrayView1<'_, f64>,
    ) {
        let n = previous.len();
        let offset = self.previous_offset();
        if self.includes_elapsed() {
            out[0] = elapsed;
        }
        out.slice_mut(s![offset..offset + n]).assign(&previous);
        if *self == FeatureLayout::LaggedCurrent {
            out.slice_mut(s![offset + n..]).assign(&current);
        }
    }
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureLayout::ElapsedPrevious => "elapsed_previous",
            FeatureLayout::LaggedCurrent => "lagged_current",
            FeatureLayout::PreviousOnly => "previous_only",
        };
        f.write_str(name)
    }
}

impl FromStr for FeatureLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "elapsed_previous" => Ok(FeatureLayout::ElapsedPrevious),
            "lagged_current" => Ok(FeatureLayout::LaggedCurrent),
            "previous_only" => Ok(FeatureLayout::PreviousOnly),
            other => Err(format!("unknown feature layout: {other}")),
        }
    }
}

/// Provenance of one output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairIndex {
    pub subject: SubjectKey,
    /// Row of the earlier observation in the input table
    pub previous_row: usize,
    /// Row of the later observation in the input table
    pub current_row: usize,
    pub previous_time: TimePoint,
    pub current_time: TimePoint,
    pub elapsed: f64,
}

/// Counters collected while pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingStats {
    /// Rows in the input table
    pub records: usize,
    /// Distinct subjects seen
    pub subjects: usize,
    /// Subjects with a single observation
    pub singleton_subjects: usize,
    /// Pairs emitted
    pub pairs: usize,
    /// Pairs skipped because a row had missing values
    pub dropped_pairs: usize,
    /// Consecutive observations of a subject sharing a timestamp
    pub duplicate_timestamps: usize,
}

/// The supervised learning problem: `X` predicts `Y` row by row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedData {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub x_columns: Vec<String>,
    pub y_columns: Vec<String>,
    pub pairs: Vec<PairIndex>,
    pub layout: FeatureLayout,
    pub stats: PairingStats,
}

impl SupervisedData {
    pub fn n_pairs(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.n_pairs() == 0
    }

    /// Elapsed time of every pair, in output order.
    pub fn elapsed(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.elapsed).collect()
    }

    /// The previous-state feature block of `X`.
    pub fn previous_features(&self) -> ndarray::ArrayView2<'_, f64> {
        let offset = self.layout.previous_offset();
        self.x.slice(s![.., offset..offset + self.y.ncols()])
    }
}

/// Assemble `X` and `Y` from pair provenance and a row-major feature matrix.
pub(crate) fn assemble(
    features: &Array2<f64>,
    pairs: &[PairIndex],
    layout: FeatureLayout,
) -> (Array2<f64>, Array2<f64>) {
    let n_features = features.ncols();
    let mut x = Array2::<f64>::zeros((pairs.len(), layout.width(n_features)));
    let mut y = Array2::<f64>::zeros((pairs.len(), n_features));

    for (i, pair) in pairs.iter().enumerate() {
        let previous = features.row(pair.previous_row);
        let current = features.row(pair.current_row);

        layout.fill_row(x.row_mut(i), pair.elapsed, previous, current);
        y.row_mut(i).assign(&current);
    }

    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn pair(prev: usize, curr: usize, elapsed: f64) -> PairIndex {
        PairIndex {
            subject: SubjectKey::Integer(1),
            previous_row: prev,
            current_row: curr,
            previous_time: TimePoint::Numeric(prev as f64),
            current_time: TimePoint::Numeric(curr as f64),
            elapsed,
        }
    }

    #[test]
    fn test_layout_widths() {
        assert_eq!(FeatureLayout::ElapsedPrevious.width(3), 4);
        assert_eq!(FeatureLayout::LaggedCurrent.width(3), 7);
        assert_eq!(FeatureLayout::PreviousOnly.width(3), 3);
    }

    #[test]
    fn test_layout_column_names() {
        let features = vec!["taxon_a".to_string(), "taxon_b".to_string()];
        let names = FeatureLayout::LaggedCurrent.column_names("elapsed_days", &features);
        assert_eq!(
            names,
            vec!["elapsed_days", "taxon_a_prev", "taxon_b_prev", "taxon_a", "taxon_b"]
        );

        let names = FeatureLayout::PreviousOnly.column_names("elapsed_days", &features);
        assert_eq!(names, vec!["taxon_a_prev", "taxon_b_prev"]);
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!(
            "lagged-current".parse::<FeatureLayout>().unwrap(),
            FeatureLayout::LaggedCurrent
        );
        assert_eq!(
            FeatureLayout::ElapsedPrevious.to_string().parse::<FeatureLayout>().unwrap(),
            FeatureLayout::ElapsedPrevious
        );
        assert!("everything".parse::<FeatureLayout>().is_err());
    }

    #[test]
    fn test_assemble_lagged_current() {
        let features = array![[0.1, 0.9], [0.2, 0.8], [0.3, 0.7]];
        let pairs = vec![pair(0, 1, 1.5), pair(1, 2, 2.0)];

        let (x, y) = assemble(&features, &pairs, FeatureLayout::LaggedCurrent);
        assert_eq!(x, array![[1.5, 0.1, 0.9, 0.2, 0.8], [2.0, 0.2, 0.8, 0.3, 0.7]]);
        assert_eq!(y, array![[0.2, 0.8], [0.3, 0.7]]);
    }

    #[test]
    fn test_assemble_column_major_features() {
        let features = array![[0.1, 0.2, 0.3], [0.9, 0.8, 0.7]].reversed_axes();
        let pairs = vec![pair(0, 1, 1.5), pair(1, 2, 2.0)];

        let (x, _) = assemble(&features, &pairs, FeatureLayout::ElapsedPrevious);
        assert_eq!(x, array![[1.5, 0.1, 0.9], [2.0, 0.2, 0.8]]);

        let (x, y) = assemble(&features, &pairs, FeatureLayout::PreviousOnly);
        assert_eq!(x, array![[0.1, 0.9], [0.2, 0.8]]);
        assert_eq!(y, array![[0.2, 0.8], [0.3, 0.7]]);
    }

    #[test]
    fn test_assemble_without_pairs() {
        let features = array![[0.5, 0.5]];
        let (x, y) = assemble(&features, &[], FeatureLayout::ElapsedPrevious);
        assert_eq!(x.dim(), (0, 3));
        assert_eq!(y.dim(), (0, 2));
    }
}
