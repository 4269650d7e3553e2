//! Identity provider error types.

use thiserror::Error;

/// Identity provider error type.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider refused to issue a login code
    #[error("Code delivery rejected: {0}")]
    SendRejected(String),

    /// Provider answered with a status this client does not understand
    #[error("Unexpected provider status: {0}")]
    UnexpectedStatus(String),

    /// Provider answered with a required field missing
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Provider returned a non-success HTTP status
    #[error("Provider returned HTTP {status}: {body_summary}")]
    Api { status: u16, body_summary: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Connection failures and timeouts
    /// - HTTP errors with 5xx status codes
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using ProviderError.
pub type ProviderResult<T> = Result<T, ProviderError>;
