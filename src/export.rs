//! Dataset export.
//!
//! Writes `X`, `Y` and the pair provenance together with a manifest that
//! records who produced the dataset, when, and from what build.
//!
//! # Formats
//!
//! - `json`: one document with the manifest, both matrices and all pairs
//! - `jsonl`: a manifest line followed by one line per pair
//! - `csv`: `x.csv` and `y.csv` with headers, plus `manifest.json`

use crate::core::{FeatureLayout, PairIndex, SupervisedData};
use crate::report::BuildReport;
use crate::VERSION;
use chrono::Utc;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// The current export format version.
pub const EXPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "supervised-lag";

/// Errors raised while writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// On-disk export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Jsonl,
    Csv,
}

impl ExportFormat {
    /// File name used when the output path is a directory.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "supervised.json",
            ExportFormat::Jsonl => "supervised.jsonl",
            ExportFormat::Csv => "manifest.json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "ndjson" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// Description of an exported dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub export_version: String,
    pub producer: Producer,
    /// RFC 3339 creation time
    pub created_at_utc: String,
    pub format: ExportFormat,
    pub layout: FeatureLayout,
    pub rows: usize,
    pub x_columns: Vec<String>,
    pub y_columns: Vec<String>,
    pub report: BuildReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// Single-document JSON export.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonExport {
    pub manifest: Manifest,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<Vec<f64>>,
    pub pairs: Vec<PairIndex>,
}

/// One pair in a JSON Lines export.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonlRecord {
    #[serde(flatten)]
    pub pair: PairIndex,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Writes supervised datasets to disk.
pub struct DatasetExporter {
    instance_id: Uuid,
    source: Option<String>,
}

impl DatasetExporter {
    /// Create a new exporter with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            source: None,
        }
    }

    /// Record where the input table came from.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the instance ID.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build the manifest for `data`.
    pub fn manifest(&self, data: &SupervisedData, format: ExportFormat) -> Manifest {
        let meta = self.source.as_ref().map(|source| {
            let mut meta = HashMap::new();
            meta.insert(
                "source".to_string(),
                serde_json::Value::String(source.clone()),
            );
            meta
        });

        Manifest {
            export_version: EXPORT_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: Some(self.instance_id.to_string()),
            },
            created_at_utc: Utc::now().to_rfc3339(),
            format,
            layout: data.layout,
            rows: data.n_pairs(),
            x_columns: data.x_columns.clone(),
            y_columns: data.y_columns.clone(),
            report: BuildReport::from_data(data),
            meta,
        }
    }

    /// Write `data` under `output` and return the files written.
    ///
    /// For `json` and `jsonl`, `output` is a file path unless it names an
    /// existing directory. For `csv`, `output` is always a directory.
    pub fn write(
        &self,
        data: &SupervisedData,
        format: ExportFormat,
        output: &Path,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let manifest = self.manifest(data, format);

        let written = match format {
            ExportFormat::Json => {
                let path = resolve_file(output, format)?;
                let document = JsonExport {
                    manifest,
                    x: rows(&data.x),
                    y: rows(&data.y),
                    pairs: data.pairs.clone(),
                };
                let mut writer = BufWriter::new(File::create(&path)?);
                serde_json::to_writer_pretty(&mut writer, &document)?;
                writer.flush()?;
                vec![path]
            }
            ExportFormat::Jsonl => {
                let path = resolve_file(output, format)?;
                let mut writer = BufWriter::new(File::create(&path)?);
                serde_json::to_writer(&mut writer, &manifest)?;
                writeln!(writer)?;
                for (i, pair) in data.pairs.iter().enumerate() {
                    let record = JsonlRecord {
                        pair: pair.clone(),
                        x: data.x.row(i).to_vec(),
                        y: data.y.row(i).to_vec(),
                    };
                    serde_json::to_writer(&mut writer, &record)?;
                    writeln!(writer)?;
                }
                writer.flush()?;
                vec![path]
            }
            ExportFormat::Csv => {
                std::fs::create_dir_all(output)?;
                let x_path = output.join("x.csv");
                let y_path = output.join("y.csv");
                let manifest_path = output.join(format.default_file_name());

                write_matrix_csv(&x_path, &data.x_columns, &data.x)?;
                write_matrix_csv(&y_path, &data.y_columns, &data.y)?;
                std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
                vec![x_path, y_path, manifest_path]
            }
        };

        info!(
            format = %format,
            rows = data.n_pairs(),
            files = written.len(),
            "Exported supervised dataset"
        );
        Ok(written)
    }
}

impl Default for DatasetExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the output file, creating parent directories as needed.
fn resolve_file(output: &Path, format: ExportFormat) -> Result<PathBuf, std::io::Error> {
    let path = if output.is_dir() {
        output.join(format.default_file_name())
    } else {
        output.to_path_buf()
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(path)
}

fn rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn write_matrix_csv(
    path: &Path,
    header: &[String],
    matrix: &Array2<f64>,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in matrix.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{build_supervised, PairingConfig};
    use crate::table::{Column, ObservationTable};

    fn sample_data() -> SupervisedData {
        let table = ObservationTable::new(vec![
            Column::text("subject_id", vec!["A", "A", "B", "B"]),
            Column::float("timestamp", vec![0.0, 1.0, 0.0, 3.0]),
            Column::float("taxon_a", vec![0.1, 0.2, 0.5, 0.6]),
            Column::float("taxon_b", vec![0.9, 0.8, 0.5, 0.4]),
        ])
        .unwrap();
        build_supervised(&table, &PairingConfig::default()).unwrap()
    }

    #[test]
    fn test_manifest_contents() {
        let exporter = DatasetExporter::new().with_source("cohort.csv");
        let manifest = exporter.manifest(&sample_data(), ExportFormat::Json);

        assert_eq!(manifest.export_version, EXPORT_VERSION);
        assert_eq!(manifest.producer.name, PRODUCER_NAME);
        assert_eq!(
            manifest.producer.instance_id,
            Some(exporter.instance_id().to_string())
        );
        assert_eq!(manifest.rows, 2);
        assert_eq!(manifest.x_columns, vec!["elapsed", "taxon_a_prev", "taxon_b_prev"]);
        assert_eq!(
            manifest.meta.unwrap()["source"],
            serde_json::Value::String("cohort.csv".to_string())
        );
    }

    #[test]
    fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let written = DatasetExporter::new()
            .write(&sample_data(), ExportFormat::Json, dir.path())
            .unwrap();

        assert_eq!(written, vec![dir.path().join("supervised.json")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        let document: JsonExport = serde_json::from_str(&content).unwrap();
        assert_eq!(document.x, vec![vec![1.0, 0.1, 0.9], vec![3.0, 0.5, 0.5]]);
        assert_eq!(document.y, vec![vec![0.2, 0.8], vec![0.6, 0.4]]);
        assert_eq!(document.pairs.len(), 2);
    }

    #[test]
    fn test_jsonl_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("pairs.jsonl");
        DatasetExporter::new()
            .write(&sample_data(), ExportFormat::Jsonl, &path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let manifest: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(manifest["format"], "jsonl");

        let record: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(record["subject"], "B");
        assert_eq!(record["y"][1], 0.4);
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("csv");
        let written = DatasetExporter::new()
            .write(&sample_data(), ExportFormat::Csv, &output)
            .unwrap();
        assert_eq!(written.len(), 3);

        let x = std::fs::read_to_string(output.join("x.csv")).unwrap();
        let mut lines = x.lines();
        assert_eq!(lines.next(), Some("elapsed,taxon_a_prev,taxon_b_prev"));
        assert_eq!(lines.next(), Some("1,0.1,0.9"));

        assert!(output.join("manifest.json").exists());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("ndjson".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
        assert!("parquet".parse::<ExportFormat>().is_err());
    }
}
