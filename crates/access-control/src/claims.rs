//! Provider-side claim checks.

use async_trait::async_trait;
use thiserror::Error;

/// Claim lookup failure. The evaluator treats any failure as a denial.
#[derive(Error, Debug)]
#[error("Claim check failed: {0}")]
pub struct ClaimError(pub String);

/// Asynchronous permission and role assertions answered by the identity
/// provider.
///
/// The local permission map resolves most lookups; this trait answers for
/// permissions the map does not know and for roles beyond the built-in
/// `user`/`pilot` pair.
#[async_trait]
pub trait ClaimSource: Send + Sync {
    async fn check_permission_claim(
        &self,
        user_id: &str,
        permission: &str,
    ) -> Result<bool, ClaimError>;

    async fn check_role_claim(&self, user_id: &str, role: &str) -> Result<bool, ClaimError>;
}

/// Claim source that denies everything. The safe default when no provider
/// integration is wired up.
#[derive(Debug, Default)]
pub struct DenyAllClaims;

#[async_trait]
impl ClaimSource for DenyAllClaims {
    async fn check_permission_claim(
        &self,
        _user_id: &str,
        _permission: &str,
    ) -> Result<bool, ClaimError> {
        Ok(false)
    }

    async fn check_role_claim(&self, _user_id: &str, _role: &str) -> Result<bool, ClaimError> {
        Ok(false)
    }
}
