//! Fail-closed session validation.

use crate::provider::PasswordlessProvider;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fail-closed adapter over the identity provider's session calls.
///
/// Provider failures are indistinguishable from "no session" here: callers
/// that gate work on `session_exists` must never be let through by a
/// provider outage. The validator owns no state; it exists so the rest of
/// the gate never touches the provider's session surface directly.
#[derive(Clone)]
pub struct SessionValidator {
    provider: Arc<dyn PasswordlessProvider>,
}

impl SessionValidator {
    /// Create a validator over the given provider.
    pub fn new(provider: Arc<dyn PasswordlessProvider>) -> Self {
        Self { provider }
    }

    /// Checks whether a provider session exists.
    ///
    /// Never errors: provider failures read as "no session".
    pub async fn session_exists(&self) -> bool {
        match self.provider.session_exists().await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(error = %err, "Session check failed, treating as no session");
                false
            }
        }
    }

    /// Returns the provider user id for the current session, if any.
    ///
    /// Never errors: provider failures read as "no user".
    pub async fn user_id(&self) -> Option<String> {
        match self.provider.user_id().await {
            Ok(user_id) => user_id,
            Err(err) => {
                warn!(error = %err, "User id lookup failed, treating as absent");
                None
            }
        }
    }

    /// Terminates the provider session, best-effort.
    ///
    /// Returns whether the remote call succeeded; callers treat local
    /// sign-out as successful either way.
    pub async fn sign_out(&self) -> bool {
        match self.provider.sign_out().await {
            Ok(()) => {
                debug!("Provider session terminated");
                true
            }
            Err(err) => {
                warn!(error = %err, "Provider sign-out failed, continuing with local reset");
                false
            }
        }
    }
}
