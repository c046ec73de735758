//! Error types for the fetch and extraction pipeline.
//!
//! Only failures that should end the current operation live here. A corrupt
//! cache store and a missing optional field are recovered where they occur
//! and never become an [`NpsError`].

use reqwest::StatusCode;

/// Errors that terminate the current operation.
#[derive(Debug, thiserror::Error)]
pub enum NpsError {
    /// The transport failed before a response arrived.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status code.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// A parameterized response was not valid JSON.
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required element is missing from an upstream page.
    #[error("page layout changed: {0}")]
    Structure(String),

    /// A proximity result does not have the expected fields.
    #[error("malformed proximity result: {0}")]
    MalformedResult(#[source] serde_json::Error),

    /// The cached payload for a fingerprint is not the shape the caller expects.
    #[error("cached payload for {fingerprint} is {found}, expected {expected}")]
    PayloadShape {
        fingerprint: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("cache store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NpsError>;

impl NpsError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NpsError::Network { .. } => true,
            NpsError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
