//! Error types for the RBM engine

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, RbmError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum RbmError {
    /// Invalid model configuration (fatal at construction)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A sample does not match the visible layer size
    #[error("sample has {got} components, visible layer has {expected}")]
    SampleShape { got: usize, expected: usize },

    /// A hidden unit index is out of range
    #[error("hidden unit {index} out of range (model has {size} hidden units)")]
    UnitOutOfRange { index: usize, size: usize },

    /// Training was requested with no samples
    #[error("no training samples provided")]
    EmptyDataset,

    /// A snapshot is malformed or dimensionally inconsistent
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// Unknown training method tag in a snapshot
    #[error("unknown training method: {0}")]
    UnknownMethod(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
