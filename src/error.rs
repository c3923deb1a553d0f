//! Error types for the uHoo API client.

use std::time::Duration;
use thiserror::Error;

/// Base error type for uHoo API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The API key was rejected when generating an access token.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The session lapsed and the single transparent re-login did not help.
    #[error("session expired and re-authentication failed: {message}")]
    SessionExpired { message: String },

    /// The requested resource is unknown to this account.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The vendor signalled throttling. Callers must wait; the client never
    /// retries rate-limited requests on its own.
    #[error("rate limited by the uHoo API")]
    RateLimited {
        /// Parsed `Retry-After` hint, when the vendor sent one.
        retry_after: Option<Duration>,
    },

    /// A caller-supplied argument violates a precondition. Raised before any
    /// network I/O happens.
    #[error("invalid argument: {message}")]
    Validation { message: String },

    /// Network-level failure: connection, TLS, or per-request timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other non-success response from the vendor.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
