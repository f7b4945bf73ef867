//! Error types for the transfer-factor fit tooling

use thiserror::Error;

/// Common error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// A required namespace (category) is absent from the input store.
    #[error("namespace '{key}' is not available, only the following namespaces were found: {available:?}")]
    MissingNamespace {
        /// Key that was requested.
        key: String,
        /// Keys actually present in the store.
        available: Vec<String>,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
