//! Progressive fetch error type.

use thiserror::Error;

/// Error returned by a single image fetch. Every variant is terminal for
/// that image; fetches are never retried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (connection, TLS, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response status was neither 200 nor 206.
    #[error("HTTP {0}")]
    Http(u16),
    /// The blocking worker running the transfer panicked or was cancelled.
    #[error("fetch worker failed: {0}")]
    Worker(String),
    /// Transport-specific failure that is not a curl error.
    #[error("transport: {0}")]
    Transport(String),
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(e: tokio::task::JoinError) -> Self {
        FetchError::Worker(e.to_string())
    }
}
