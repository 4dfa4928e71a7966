//! Error types for the batch pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error class recorded in the run summary for a failed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    RasterOpen,
    CrsResolution,
    Parse,
    Aggregation,
    CombinerMismatch,
    Write,
    Summary,
    Io,
    /// A panic caught at the per-file isolation boundary
    Internal,
}

/// Main error type for batch operations.
///
/// `Validation` and `RasterOpen` abort a run before any file is processed,
/// `Summary` after all files were processed. Every other variant is scoped
/// to the file being processed and becomes a `Failed` outcome.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Cannot open raster {}: {source}", .path.display())]
    RasterOpen {
        path: PathBuf,
        #[source]
        source: zonestat_core::Error,
    },

    #[error("CRS resolution failed: {0}")]
    CrsResolution(String),

    #[error("Cannot parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Aggregation failed on layer '{layer}': {reason}")]
    Aggregation { layer: String, reason: String },

    #[error("Statistic count mismatch: {layer_a} + {layer_b} results for {features} features")]
    CombinerMismatch {
        layer_a: usize,
        layer_b: usize,
        features: usize,
    },

    #[error("Cannot write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Cannot persist run summary: {0}")]
    Summary(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Error class for the run summary
    pub fn kind(&self) -> FailureKind {
        match self {
            BatchError::Validation(_) => FailureKind::Validation,
            BatchError::RasterOpen { .. } => FailureKind::RasterOpen,
            BatchError::CrsResolution(_) => FailureKind::CrsResolution,
            BatchError::Parse { .. } => FailureKind::Parse,
            BatchError::Aggregation { .. } => FailureKind::Aggregation,
            BatchError::CombinerMismatch { .. } => FailureKind::CombinerMismatch,
            BatchError::Write { .. } => FailureKind::Write,
            BatchError::Summary(_) => FailureKind::Summary,
            BatchError::Io(_) => FailureKind::Io,
        }
    }

    /// Whether the error aborts the whole run rather than one file
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            BatchError::Validation(_) | BatchError::RasterOpen { .. } | BatchError::Summary(_)
        )
    }
}

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;
