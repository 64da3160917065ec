//! Error types for the serving core

use std::path::PathBuf;
use thiserror::Error;

use crate::ensemble::ModelError;

/// Errors raised while loading, validating or running the serving context
#[derive(Error, Debug)]
pub enum CoreError {
    /// Trained pipeline artifact missing on disk
    #[error("Model not found at {}. Run training to create it", .0.display())]
    ModelNotFound(PathBuf),

    /// Feature metadata record missing on disk
    #[error("Model metadata not found at {}. Make sure the metadata file exists", .0.display())]
    MetadataNotFound(PathBuf),

    /// Metadata record could not be parsed or lacks a required key
    #[error("Invalid model metadata: {0}")]
    InvalidMetadata(String),

    /// Pipeline artifact could not be parsed or failed validation
    #[error("Failed to load model from {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    /// Stored digest does not match the artifact contents
    #[error("Model hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Caller supplied something other than a feature mapping
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// No pipeline is currently loaded
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// The pipeline itself failed while scoring
    #[error("Model prediction failed: {0}")]
    Inference(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ModelError> for CoreError {
    fn from(err: ModelError) -> Self {
        CoreError::Inference(err.to_string())
    }
}

impl CoreError {
    /// True when the error was caused by the caller's payload
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::InvalidInput(_))
    }
}

/// Result type for serving core operations
pub type Result<T> = std::result::Result<T, CoreError>;
