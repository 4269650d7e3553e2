//! Request orchestration error types.

use std::sync::Arc;
use thiserror::Error;

/// Request orchestration error type.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// No session at dispatch time, or the backend rejected the call with 401
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// Backend answered non-success; message parsed from the error payload
    /// when present, otherwise a generic HTTP description
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Outcome shared with a concurrent identical read that failed
    #[error("{0}")]
    Shared(Arc<OrchestratorError>),
}

impl OrchestratorError {
    /// Returns true if the caller must re-authenticate before anything else.
    ///
    /// These failures are never retried and always carry a redirect signal.
    pub fn is_authentication(&self) -> bool {
        match self {
            OrchestratorError::Authentication(_) => true,
            OrchestratorError::Shared(inner) => inner.is_authentication(),
            _ => false,
        }
    }

    /// Returns the HTTP status the backend answered with, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            OrchestratorError::Api { status, .. } => Some(*status),
            OrchestratorError::Http(e) => e.status().map(|s| s.as_u16()),
            OrchestratorError::Shared(inner) => inner.status(),
            _ => None,
        }
    }

    /// Returns true if the backend reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            OrchestratorError::Api { status, .. } => *status >= 500,
            OrchestratorError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            OrchestratorError::Shared(inner) => inner.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias using OrchestratorError.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
