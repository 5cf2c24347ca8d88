//! Supervised Lag - turn longitudinal compositional data into supervised pairs.
//!
//! Each observation of a subject is paired with the observation that
//! immediately precedes it. The earlier observation (plus the time elapsed
//! since it) becomes a row of `X`; the later observation becomes the
//! matching row of `Y`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Supervised Lag                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │    Table    │──▶│   Series    │──▶│   Pairing   │       │
//! │  │ (CSV/typed) │   │ (sort/group)│   │  (lag-1)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                              ┌──────────────┴─────┐         │
//! │                              ▼                    ▼         │
//! │                       ┌─────────────┐     ┌─────────────┐   │
//! │                       │   Report    │     │   Export    │   │
//! │                       └─────────────┘     └─────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use supervised_lag::{build_supervised, Column, ObservationTable, PairingConfig};
//!
//! let table = ObservationTable::new(vec![
//!     Column::text("subject_id", vec!["A", "A", "A"]),
//!     Column::integer("timestamp", vec![1, 2, 3]),
//!     Column::float("taxon", vec![1.0, 2.0, 3.0]),
//! ])
//! .unwrap();
//!
//! let data = build_supervised(&table, &PairingConfig::default()).unwrap();
//! assert_eq!(data.n_pairs(), 2);
//! ```

pub mod config;
pub mod core;
pub mod export;
pub mod report;
pub mod table;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, ExportConfig, InputConfig};
pub use core::{
    build_supervised, BuildError, ElapsedUnit, FeatureLayout, LagPairBuilder, MissingPolicy,
    PairIndex, PairingConfig, PairingStats, SupervisedData,
};
pub use export::{DatasetExporter, ExportError, ExportFormat, Manifest};
pub use report::{BuildReport, ElapsedSummary};
pub use table::{
    Column, ColumnValues, CsvLoader, ObservationTable, SubjectKey, TableError, TimestampKind,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
