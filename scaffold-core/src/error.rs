//! Error types for the scaffold-core crate.

use thiserror::Error;

/// Top-level error type for detector training and routing.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    /// An inference call reached a model that has not been fit.
    #[error("Model is not trained yet: {0}")]
    NotTrained(String),

    /// Input is neither a named frame nor a well-formed numeric matrix.
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// The feature space cannot feed the chosen perturbation strategy.
    #[error("Unsupported feature space: {0}")]
    UnsupportedFeatureSpace(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl ScaffoldError {
    pub fn not_trained(msg: impl Into<String>) -> Self {
        Self::NotTrained(msg.into())
    }

    pub fn unsupported_input(msg: impl Into<String>) -> Self {
        Self::UnsupportedInput(msg.into())
    }

    pub fn unsupported_feature_space(msg: impl Into<String>) -> Self {
        Self::UnsupportedFeatureSpace(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error reports a call made before training.
    pub fn is_not_trained(&self) -> bool {
        matches!(self, Self::NotTrained(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScaffoldError>;
