//! Error types for the cliniq training pipeline

use thiserror::Error;

/// Result type alias for cliniq operations
pub type Result<T> = std::result::Result<T, CliniqError>;

/// Main error type for the training pipeline
#[derive(Error, Debug)]
pub enum CliniqError {
    /// Upstream source/query failure. Fatal to the run; data problems don't
    /// self-heal by retrying.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// The usable batch is below the training floor. Signals the caller to
    /// fall back to the rules engine instead of ML.
    #[error("Insufficient training data: {found} usable rows, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    /// A class cannot appear in both train and test partitions.
    #[error("Cannot stratify: class '{class}' has {count} sample(s), need at least 2")]
    Stratification { class: String, count: usize },

    /// Registry metadata write failed. The pipeline downgrades this to a
    /// warning once the artifact file itself has been persisted.
    #[error("Registry write failed: {0}")]
    RegistryWrite(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<polars::error::PolarsError> for CliniqError {
    fn from(err: polars::error::PolarsError) -> Self {
        CliniqError::DataUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CliniqError {
    fn from(err: serde_json::Error) -> Self {
        CliniqError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CliniqError {
    fn from(err: ndarray::ShapeError) -> Self {
        CliniqError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CliniqError::InsufficientData {
            found: 30,
            required: 50,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient training data: 30 usable rows, need at least 50"
        );
    }

    #[test]
    fn test_stratification_names_class() {
        let err = CliniqError::Stratification {
            class: "hypotension".to_string(),
            count: 1,
        };
        assert!(err.to_string().contains("hypotension"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CliniqError = io_err.into();
        assert!(matches!(err, CliniqError::IoError(_)));
    }
}
