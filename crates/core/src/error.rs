//! Error types for the retention engine.

use thiserror::Error;

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the retention engine.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Fatal Errors (abort the run before any deletion)
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid retention policy: {0}")]
    InvalidPolicy(String),

    #[error("Listing failed: {0}")]
    Listing(String),

    #[error("Retention run already in progress for {0}")]
    RunInProgress(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // =========================================================================
    // Per-object Errors (aggregated into the run result)
    // =========================================================================
    #[error("Failed to delete {key}: {message}")]
    Deletion { key: String, message: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a policy validation error.
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    /// Create a listing error.
    pub fn listing(msg: impl Into<String>) -> Self {
        Self::Listing(msg.into())
    }

    /// Create a per-object deletion error.
    pub fn deletion(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Deletion {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error aborts a run rather than being recorded per object.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Deletion { .. })
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidPolicy(_) => "INVALID_POLICY",
            Self::Listing(_) => "LISTING_ERROR",
            Self::RunInProgress(_) => "RUN_IN_PROGRESS",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Deletion { .. } => "DELETION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}
