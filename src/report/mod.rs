//! Reporting for pair builds.
//!
//! A report records what went into a build and what came out of it, so
//! every exported dataset can be traced back to its input.

pub mod summary;

// Re-export commonly used types
pub use summary::{BuildReport, ElapsedSummary};
