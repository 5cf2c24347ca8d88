//! Build statistics and their human-readable summary.

use crate::core::{FeatureLayout, SupervisedData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Min, OrderStatistics};
use std::path::Path;

/// Distribution of elapsed time between paired observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElapsedSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (0 for a single pair)
    pub std_dev: f64,
}

impl ElapsedSummary {
    /// Summarise a set of elapsed times; `None` when empty.
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut data = Data::new(values);
        let mean = data.mean()?;
        // statrs yields NaN for a single sample
        let std_dev = data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);

        Some(Self {
            min: data.min(),
            max: data.max(),
            mean,
            median: data.median(),
            std_dev,
        })
    }
}

/// Everything known about one build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub records: usize,
    pub subjects: usize,
    pub singleton_subjects: usize,
    pub pairs: usize,
    pub dropped_pairs: usize,
    pub duplicate_timestamps: usize,
    pub layout: FeatureLayout,
    pub x_shape: (usize, usize),
    pub y_shape: (usize, usize),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<ElapsedSummary>,
    pub generated_at: DateTime<Utc>,
}

impl BuildReport {
    /// Collect the report for a finished build.
    pub fn from_data(data: &SupervisedData) -> Self {
        let stats = &data.stats;
        Self {
            records: stats.records,
            subjects: stats.subjects,
            singleton_subjects: stats.singleton_subjects,
            pairs: stats.pairs,
            dropped_pairs: stats.dropped_pairs,
            duplicate_timestamps: stats.duplicate_timestamps,
            layout: data.layout,
            x_shape: data.x.dim(),
            y_shape: data.y.dim(),
            elapsed: ElapsedSummary::from_values(data.elapsed()),
            generated_at: Utc::now(),
        }
    }

    /// Whether the build produced any pairs.
    pub fn has_pairs(&self) -> bool {
        self.pairs > 0
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let elapsed = match &self.elapsed {
            Some(e) => format!(
                "min {:.3}, median {:.3}, mean {:.3}, max {:.3}, sd {:.3}",
                e.min, e.median, e.mean, e.max, e.std_dev
            ),
            None => "n/a".to_string(),
        };

        format!(
            "Build Summary:\n\
             - Records: {}\n\
             - Subjects: {} ({} with a single observation)\n\
             - Pairs: {}\n\
             - Dropped pairs (missing values): {}\n\
             - Repeated timestamps: {}\n\
             - Layout: {}\n\
             - X: {} x {}\n\
             - Y: {} x {}\n\
             - Elapsed time: {}",
            self.records,
            self.subjects,
            self.singleton_subjects,
            self.pairs,
            self.dropped_pairs,
            self.duplicate_timestamps,
            self.layout,
            self.x_shape.0,
            self.x_shape.1,
            self.y_shape.0,
            self.y_shape.1,
            elapsed
        )
    }

    /// Save the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
