//! Error types for Retrace
//!
//! This module defines all error types used throughout the library,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Retrace operations
///
/// This enum encompasses all possible errors that can occur while
/// reconciling the checkpoint timeline, talking to the checkpoint
/// backend, and maintaining the local session registry.
#[derive(Error, Debug)]
pub enum RetraceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint API errors (list, diff, create, fork, verify)
    #[error("Checkpoint API error: {0}")]
    Api(String),

    /// Invalid caller input (empty fork description, unknown checkpoint id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session registry storage errors (quota, corrupt blob, unavailable backend)
    ///
    /// The registry itself never surfaces these to its caller; they exist so
    /// the `BlobStore` seam can report failures for the registry to log and
    /// swallow.
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Retrace operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
