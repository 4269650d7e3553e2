//! Session-enforced backend HTTP client.
//!
//! Every authenticated call runs the same pipeline: session check,
//! standard headers, credentialed dispatch, 401-to-redirect mapping, and
//! error payload parsing. Reads are deduplicated through the pending
//! request registry; writes always dispatch.

use crate::dedup::{PendingRequestRegistry, RequestFingerprint, ServiceKind, SharedResponse};
use crate::error::{OrchestratorError, OrchestratorResult};
use identity_provider::SessionValidator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Why the client is demanding a redirect to the login surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// No provider session at dispatch time.
    MissingSession,
    /// The backend rejected the call with 401.
    Unauthorized,
}

/// Callback invoked when an authenticated call finds the session missing or
/// rejected. Fired at most once per failing call, shared readers included.
pub type RedirectCallback = Box<dyn Fn(RedirectReason) + Send + Sync>;

fn notify_redirect(callback: &Arc<Mutex<Option<RedirectCallback>>>, reason: RedirectReason) {
    let guard = callback.lock().expect("lock poisoned");
    if let Some(cb) = guard.as_ref() {
        cb(reason);
    }
}

/// Parse the backend's `{message}` error payload, falling back to a generic
/// description when the body is not parseable.
fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        })
}

/// Backend API client with session enforcement and read deduplication.
///
/// Credentials travel on the injected cookie-enabled `reqwest::Client`;
/// callers share that client with the identity provider integration so the
/// session cookie set at login is attached here automatically.
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    validator: SessionValidator,
    registry: PendingRequestRegistry,
    redirect_callback: Arc<Mutex<Option<RedirectCallback>>>,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `http_client` - Shared cookie-enabled client
    /// * `base_url` - Backend origin (e.g., `https://app.clarity.dev`)
    /// * `validator` - Session validator consulted before every call
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        validator: SessionValidator,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            validator,
            registry: PendingRequestRegistry::new(),
            redirect_callback: Arc::new(Mutex::new(None)),
        }
    }

    /// Registers the redirect callback fired on authentication failures.
    pub fn set_redirect_callback(&self, callback: RedirectCallback) {
        let mut guard = self.redirect_callback.lock().expect("lock poisoned");
        *guard = Some(callback);
    }

    /// The pending-read registry backing this client.
    pub fn registry(&self) -> &PendingRequestRegistry {
        &self.registry
    }

    fn request_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Refuses to dispatch without a provider session.
    async fn ensure_session(&self) -> OrchestratorResult<()> {
        if self.validator.session_exists().await {
            return Ok(());
        }
        warn!("Refusing backend call without a session, signalling redirect");
        notify_redirect(&self.redirect_callback, RedirectReason::MissingSession);
        Err(OrchestratorError::Authentication(
            "no active session".to_string(),
        ))
    }

    /// Maps a response to its shared outcome: 401 becomes an authentication
    /// failure (with one redirect signal), other non-success statuses become
    /// `Api` errors with a parsed message.
    async fn settle(
        response: reqwest::Response,
        redirect_callback: &Arc<Mutex<Option<RedirectCallback>>>,
    ) -> OrchestratorResult<SharedResponse> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("Backend rejected call with 401, signalling redirect");
            notify_redirect(redirect_callback, RedirectReason::Unauthorized);
            return Err(OrchestratorError::Authentication(
                "session rejected with HTTP 401".to_string(),
            ));
        }

        let body = response.text().await?;
        if !status.is_success() {
            let message = parse_error_message(status, &body);
            debug!(status = status.as_u16(), message = %message, "Backend call failed");
            return Err(OrchestratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(SharedResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// Issues a deduplicated GET and deserializes the JSON response.
    ///
    /// Identical concurrent reads share one network call and one outcome.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        service: ServiceKind,
        endpoint: &str,
    ) -> OrchestratorResult<T> {
        self.ensure_session().await?;

        let fingerprint = RequestFingerprint::read(service, endpoint);
        let url = self.request_url(endpoint);
        let http_client = self.http_client.clone();
        let redirect_callback = Arc::clone(&self.redirect_callback);

        let outcome = self
            .registry
            .dispatch(fingerprint, async move {
                let settled = async {
                    let response = http_client
                        .get(&url)
                        .header("Accept", "application/json")
                        .send()
                        .await?;
                    Self::settle(response, &redirect_callback).await
                }
                .await;
                settled.map_err(Arc::new)
            })
            .await;

        match outcome {
            Ok(response) => Ok(serde_json::from_str(&response.body)?),
            Err(shared) => Err(OrchestratorError::Shared(shared)),
        }
    }

    /// Issues a PUT with a JSON body. Never deduplicated.
    pub async fn put_json<T, B>(&self, endpoint: &str, body: &B) -> OrchestratorResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.ensure_session().await?;
        let response = self
            .http_client
            .put(self.request_url(endpoint))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        let settled = Self::settle(response, &self.redirect_callback).await?;
        Ok(serde_json::from_str(&settled.body)?)
    }

    /// Issues a POST with a JSON body. Never deduplicated.
    pub async fn post_json<T, B>(&self, endpoint: &str, body: &B) -> OrchestratorResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.ensure_session().await?;
        let response = self
            .http_client
            .post(self.request_url(endpoint))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        let settled = Self::settle(response, &self.redirect_callback).await?;
        Ok(serde_json::from_str(&settled.body)?)
    }

    /// Issues a POST without the session precheck.
    ///
    /// Reserved for the profile-creation path, which runs in the window
    /// where the provider session exists but may not yet be visible to the
    /// validator. Response handling is identical to the checked calls.
    pub async fn post_json_public<T, B>(&self, endpoint: &str, body: &B) -> OrchestratorResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .http_client
            .post(self.request_url(endpoint))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        let settled = Self::settle(response, &self.redirect_callback).await?;
        Ok(serde_json::from_str(&settled.body)?)
    }
}
