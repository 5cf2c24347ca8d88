//! Observation tables and their loaders.
//!
//! The builder only needs named, typed columns. Loading from disk is kept
//! separate so callers can assemble tables from any source.

pub mod loader;
pub mod types;

// Re-export commonly used types
pub use loader::{CsvLoader, TimestampKind};
pub use types::{Column, ColumnValues, ObservationTable, SubjectKey, TableError};
