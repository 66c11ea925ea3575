use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the support backend client
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...)
    #[error("Could not reach the support service: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message supplied by the backend, or a generic fallback
        message: String,
    },

    /// The backend answered, but not with the expected JSON shape
    #[error("Unexpected response from the support service: {0}")]
    Decode(String),

    /// The configured backend URL cannot be used to build request URLs
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// The task running the request died before producing a result
    #[error("Request was interrupted: {0}")]
    Interrupted(String),
}

/// Errors from the local session-id store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Session store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
