//! Error type shared by every list backend.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReputationError>;

/// Error raised while testing a host or URL.
///
/// A value that is simply not listed is never an error; every variant here
/// aborts the operation in progress.
#[derive(Debug, Error)]
pub enum ReputationError {
    /// The value is not a valid IPv4 address, IPv6 address or domain name,
    /// or is a host kind the backend does not accept.
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// One or more values are not valid URLs.
    #[error("the values: {} are not valid URLs", .0.join(","))]
    InvalidUrl(Vec<String>),

    /// A list returned a classification code missing from the local table.
    #[error("unknown classification code: {code}")]
    UnknownCode { code: u32 },

    /// The list service rejected the API key.
    #[error("{backend}: unauthorized API key")]
    UnauthorizedApiKey { backend: String },

    /// The host is valid, but the backend cannot be queried for it.
    #[error("{backend} does not support querying for {host}")]
    UnsupportedHost { backend: String, host: String },

    /// The list service answered with an unexpected HTTP status.
    #[error("{backend} returned HTTP {status}")]
    HttpStatus { backend: String, status: u16 },

    /// The list service answered with a body that could not be decoded.
    #[error("invalid response from {backend}: {reason}")]
    InvalidResponse { backend: String, reason: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// DNS failure other than a name-not-found answer.
    #[error("DNS error: {0}")]
    Dns(String),
}

impl ReputationError {
    pub(crate) fn invalid_response(backend: &str, reason: impl Into<String>) -> Self {
        ReputationError::InvalidResponse {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ReputationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ReputationError::Timeout
        } else {
            ReputationError::Http(e)
        }
    }
}
