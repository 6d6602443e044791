//! Error Handling Module
//!
//! Defines the error taxonomy shared by the data pipeline, the model loaders
//! and the inference service. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for leafscan operations
#[derive(Error, Debug)]
pub enum LeafError {
    /// A dataset root or model file does not exist
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// Operator-facing configuration problem (duplicate folders, missing classes, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No class folders or no images were found
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Persisted label metadata does not bind to the model
    #[error("Vocabulary mismatch: {0}")]
    VocabularyMismatch(String),

    /// Error decoding or processing an image
    #[error("Image error: {0}")]
    Image(String),

    /// Error with model construction or weight loading
    #[error("Model error: {0}")]
    Model(String),

    /// Error while running a prediction
    #[error("Inference error: {0}")]
    Inference(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LeafError {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, LeafError::Image(_))
    }
}

impl From<serde_json::Error> for LeafError {
    fn from(err: serde_json::Error) -> Self {
        LeafError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for LeafError {
    fn from(err: image::ImageError) -> Self {
        LeafError::Image(err.to_string())
    }
}

/// Convenience Result type for leafscan operations
pub type Result<T> = std::result::Result<T, LeafError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LeafError::Configuration("duplicate folders".to_string());
        assert_eq!(format!("{}", err), "Configuration error: duplicate folders");
    }

    #[test]
    fn test_not_found_mentions_path() {
        let err = LeafError::NotFound(PathBuf::from("/data/beans"));
        assert!(format!("{}", err).contains("/data/beans"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LeafError = io_err.into();
        assert!(matches!(err, LeafError::Io(_)));
    }

    #[test]
    fn test_client_errors() {
        assert!(LeafError::Image("bad jpeg".into()).is_client_error());
        assert!(!LeafError::Model("no weights".into()).is_client_error());
    }
}
