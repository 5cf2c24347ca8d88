//! Core functionality for building supervised pairs.
//!
//! This module contains:
//! - Ordering of observations into per-subject series
//! - The lag-1 pair builder
//! - Assembly of the `X` and `Y` matrices

pub mod matrix;
pub mod pairing;
pub mod series;

// Re-export commonly used types
pub use matrix::{FeatureLayout, PairIndex, PairingStats, SupervisedData};
pub use pairing::{
    build_supervised, BuildError, ElapsedUnit, LagPairBuilder, MissingPolicy, PairingConfig,
};
pub use series::{TimeAxis, TimePoint};
