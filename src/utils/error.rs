//! Error Handling Module
//!
//! Defines the library error type for the cross-validation harness.
//! Uses thiserror for ergonomic error definitions; the CLI binary wraps
//! these in anyhow at its seam.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for harness operations
#[derive(Error, Debug)]
pub enum GradingError {
    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset or fold layout
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with model construction or checkpointing
    #[error("Model error: {0}")]
    Model(String),

    /// Error during training
    #[error("Training error: {0}")]
    Training(String),

    /// Configuration error (unknown architecture, optimizer, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for harness operations
pub type Result<T> = std::result::Result<T, GradingError>;

impl From<serde_json::Error> for GradingError {
    fn from(err: serde_json::Error) -> Self {
        GradingError::Serialization(err.to_string())
    }
}
