//! Lifecycle error types.

use identity_provider::ProviderError;
use request_orchestrator::OrchestratorError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminated error category. The UI branches on this, never on
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input failed a local rule. Recoverable in place.
    Validation,
    /// Session or credentials rejected. Never retried.
    Authentication,
    /// Cooldown active or attempts exhausted.
    RateLimit,
    /// Network or backend trouble. Eligible for retry.
    Transient,
}

/// Error raised by lifecycle operations.
#[derive(Error, Debug, Clone)]
pub enum AuthFlowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    Transient(String),

    /// Operation invoked in a state whose transition table does not
    /// accept it.
    #[error("Cannot apply {input} in state {state}")]
    InvalidTransition { input: String, state: String },
}

impl AuthFlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthFlowError::Validation(_) | AuthFlowError::InvalidTransition { .. } => {
                ErrorKind::Validation
            }
            AuthFlowError::Authentication(_) => ErrorKind::Authentication,
            AuthFlowError::RateLimit(_) => ErrorKind::RateLimit,
            AuthFlowError::Transient(_) => ErrorKind::Transient,
        }
    }
}

impl From<ProviderError> for AuthFlowError {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::SendRejected(message) => AuthFlowError::Validation(message.clone()),
            ProviderError::Api { status: 401, .. } => {
                AuthFlowError::Authentication(err.to_string())
            }
            ProviderError::Api { status: 429, .. } => AuthFlowError::RateLimit(
                "Too many requests. Please wait before trying again.".to_string(),
            ),
            _ => AuthFlowError::Transient(err.to_string()),
        }
    }
}

impl From<OrchestratorError> for AuthFlowError {
    fn from(err: OrchestratorError) -> Self {
        if err.is_authentication() {
            return AuthFlowError::Authentication(err.to_string());
        }
        match err.status() {
            Some(429) => AuthFlowError::RateLimit(
                "Too many requests. Please wait before trying again.".to_string(),
            ),
            Some(status) if (400..500).contains(&status) => {
                AuthFlowError::Validation(err.to_string())
            }
            _ => AuthFlowError::Transient(err.to_string()),
        }
    }
}

/// Serializable view of the parked error, surfaced through snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AuthFlowError> for SurfacedError {
    fn from(err: &AuthFlowError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias using AuthFlowError.
pub type AuthResult<T> = Result<T, AuthFlowError>;
