//! Passwordless identity provider seam.
//!
//! The rest of the gate talks to the identity provider exclusively through
//! the [`PasswordlessProvider`] trait so that the concrete HTTP integration
//! can be swapped out (or mocked) without touching lifecycle logic.

use crate::error::ProviderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Handle for a login code the provider has issued.
///
/// Both identifiers must be echoed back on consume/resend calls so the
/// provider can correlate them with the original delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSent {
    /// Provider-assigned device identifier for this challenge.
    pub device_id: String,
    /// Provider-assigned pre-auth session identifier for this challenge.
    pub pre_auth_session_id: String,
}

/// Provider verdict on a submitted login code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumeStatus {
    /// Code accepted, session established.
    Ok,
    /// Code did not match; the challenge stays consumable.
    IncorrectCode,
    /// Code matched a previous delivery that has already expired.
    ExpiredCode,
    /// Challenge is dead; the whole flow must start over.
    RestartFlow,
}

/// Result of consuming a login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Session established for the given provider user.
    Accepted {
        user_id: String,
        email: Option<String>,
    },
    /// Wrong code; caller may try again within its attempt budget.
    IncorrectCode,
    /// Expired code; caller should request a fresh one.
    ExpiredCode,
    /// Challenge invalidated; caller must restart from the email step.
    RestartFlow,
}

/// Result of asking the provider to resend the active code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    /// A fresh code is on its way.
    Sent,
    /// Challenge invalidated; caller must restart from the email step.
    RestartFlow,
}

/// Passwordless (email OTP) identity provider.
///
/// Implementations own code delivery and session issuance. Session
/// credentials are expected to travel out-of-band of this trait (for the
/// HTTP implementation: cookies on a shared client), so the session calls
/// take no token arguments.
#[async_trait]
pub trait PasswordlessProvider: Send + Sync {
    /// Requests a login code for `email`.
    async fn send_code(&self, email: &str) -> ProviderResult<CodeSent>;

    /// Submits a user-entered code against an active challenge.
    async fn consume_code(
        &self,
        device_id: &str,
        pre_auth_session_id: &str,
        code: &str,
    ) -> ProviderResult<ConsumeOutcome>;

    /// Asks the provider to re-deliver the code for an active challenge.
    async fn resend_code(
        &self,
        device_id: &str,
        pre_auth_session_id: &str,
    ) -> ProviderResult<ResendOutcome>;

    /// Checks whether a provider session currently exists.
    async fn session_exists(&self) -> ProviderResult<bool>;

    /// Returns the provider user id for the current session, if any.
    async fn user_id(&self) -> ProviderResult<Option<String>>;

    /// Terminates the current provider session.
    async fn sign_out(&self) -> ProviderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_status_wire_names() {
        let ok: ConsumeStatus = serde_json::from_str("\"OK\"").unwrap();
        assert_eq!(ok, ConsumeStatus::Ok);

        let incorrect: ConsumeStatus = serde_json::from_str("\"INCORRECT_CODE\"").unwrap();
        assert_eq!(incorrect, ConsumeStatus::IncorrectCode);

        let expired: ConsumeStatus = serde_json::from_str("\"EXPIRED_CODE\"").unwrap();
        assert_eq!(expired, ConsumeStatus::ExpiredCode);

        let restart: ConsumeStatus = serde_json::from_str("\"RESTART_FLOW\"").unwrap();
        assert_eq!(restart, ConsumeStatus::RestartFlow);
    }

    #[test]
    fn test_consume_status_unknown_rejected() {
        let result: Result<ConsumeStatus, _> = serde_json::from_str("\"SOMETHING_ELSE\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_code_sent_roundtrip() {
        let sent = CodeSent {
            device_id: "dev-1".to_string(),
            pre_auth_session_id: "pas-1".to_string(),
        };
        let json = serde_json::to_string(&sent).unwrap();
        let back: CodeSent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sent);
    }
}
