//! Typed profile endpoints.
//!
//! The lifecycle runtime reaches the profile store through the
//! [`ProfileService`] trait; [`ProfileApi`] is the HTTP implementation over
//! [`ApiClient`]. Absence (404) is part of the contract, not an error: a
//! freshly verified user has a session before the store has a profile.

use crate::client::ApiClient;
use crate::dedup::ServiceKind;
use crate::error::OrchestratorResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_pilot() -> bool {
    true
}

/// Stored dashboard profile, as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub job_title: String,
    /// Analysis credits remaining on the account.
    #[serde(default)]
    pub token_balance: i64,
    /// Early-access program flag; every new account is enrolled.
    #[serde(default = "default_pilot")]
    pub pilot: bool,
}

/// `PUT /api/profile` body. Name fields nest under `metadata`, the
/// organisation fields one level further under `user_profile`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileRequest {
    pub metadata: ProfileMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileMetadata {
    pub first_name: String,
    pub last_name: String,
    pub user_profile: ProfileDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileDetails {
    pub company: String,
    pub job_title: String,
}

impl UpdateProfileRequest {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        company: impl Into<String>,
        job_title: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ProfileMetadata {
                first_name: first_name.into(),
                last_name: last_name.into(),
                user_profile: ProfileDetails {
                    company: company.into(),
                    job_title: job_title.into(),
                },
            },
        }
    }
}

/// `POST /api/auth/profile` body, the creation path for brand-new users.
#[derive(Debug, Clone, Serialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub job_title: String,
}

/// Profile store seam consumed by the lifecycle runtime.
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Fetches the current profile; `Ok(None)` when the store has none yet.
    async fn fetch_profile(&self) -> OrchestratorResult<Option<ProfileRecord>>;

    /// Updates the existing profile.
    async fn update_profile(&self, request: &UpdateProfileRequest)
        -> OrchestratorResult<ProfileRecord>;

    /// Creates a profile where none exists yet.
    async fn create_profile(&self, request: &CreateProfileRequest)
        -> OrchestratorResult<ProfileRecord>;
}

/// HTTP profile store over the session-enforced client.
pub struct ProfileApi {
    client: Arc<ApiClient>,
}

impl ProfileApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileService for ProfileApi {
    async fn fetch_profile(&self) -> OrchestratorResult<Option<ProfileRecord>> {
        match self
            .client
            .get_json::<ProfileRecord>(ServiceKind::Api, "/api/profile")
            .await
        {
            Ok(profile) => Ok(Some(profile)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> OrchestratorResult<ProfileRecord> {
        self.client.put_json("/api/profile", request).await
    }

    async fn create_profile(
        &self,
        request: &CreateProfileRequest,
    ) -> OrchestratorResult<ProfileRecord> {
        self.client.post_json_public("/api/auth/profile", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, StaticSessionProvider};
    use identity_provider::SessionValidator;
    use tokio::time::Duration;

    fn api_for(addr: std::net::SocketAddr) -> ProfileApi {
        let validator = SessionValidator::new(Arc::new(StaticSessionProvider { exists: true }));
        let client = ApiClient::new(reqwest::Client::new(), format!("http://{}", addr), validator);
        ProfileApi::new(Arc::new(client))
    }

    #[test]
    fn test_update_request_wire_shape() {
        let request = UpdateProfileRequest::new("Ada", "Lovelace", "Analytical Engines", "Engineer");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "metadata": {
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "user_profile": {
                        "company": "Analytical Engines",
                        "job_title": "Engineer"
                    }
                }
            })
        );
    }

    #[test]
    fn test_create_request_wire_shape() {
        let request = CreateProfileRequest {
            user_id: "user-9".to_string(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            company: "Analytical Engines".to_string(),
            job_title: "Engineer".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "user_id": "user-9",
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "company": "Analytical Engines",
                "job_title": "Engineer"
            })
        );
    }

    #[test]
    fn test_record_defaults_for_missing_fields() {
        let record: ProfileRecord =
            serde_json::from_str(r#"{"user_id":"user-9","email":"ada@example.com"}"#).unwrap();
        assert_eq!(record.first_name, "");
        assert_eq!(record.token_balance, 0);
        assert!(record.pilot);
    }

    #[tokio::test]
    async fn test_fetch_profile_found() {
        let server = spawn_server(
            "200 OK",
            r#"{"user_id":"user-9","email":"ada@example.com","first_name":"Ada","last_name":"Lovelace","company":"Analytical Engines","job_title":"Engineer","token_balance":250}"#,
            Duration::ZERO,
        )
        .await;

        let profile = api_for(server.addr).fetch_profile().await.unwrap().unwrap();
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.token_balance, 250);
        assert!(profile.pilot);
    }

    #[tokio::test]
    async fn test_fetch_profile_absent_on_404() {
        let server = spawn_server(
            "404 Not Found",
            r#"{"message":"Profile not found"}"#,
            Duration::ZERO,
        )
        .await;

        let profile = api_for(server.addr).fetch_profile().await.unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_fetch_profile_propagates_other_errors() {
        let server = spawn_server("503 Service Unavailable", "", Duration::ZERO).await;

        let err = api_for(server.addr).fetch_profile().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_update_profile_roundtrip() {
        let server = spawn_server(
            "200 OK",
            r#"{"user_id":"user-9","email":"ada@example.com","first_name":"Ada","last_name":"Lovelace","company":"Analytical Engines","job_title":"Engineer"}"#,
            Duration::ZERO,
        )
        .await;

        let request = UpdateProfileRequest::new("Ada", "Lovelace", "Analytical Engines", "Engineer");
        let updated = api_for(server.addr).update_profile(&request).await.unwrap();
        assert_eq!(updated.job_title, "Engineer");
    }
}
