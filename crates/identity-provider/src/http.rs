//! HTTP implementation of the passwordless provider.
//!
//! Speaks the provider's passwordless REST surface:
//! - `POST /auth/signinup/code` to request a login code
//! - `POST /auth/signinup/code/consume` to submit one
//! - `POST /auth/signinup/code/resend` to re-deliver one
//! - `GET /auth/session` to inspect the current session
//! - `POST /auth/signout` to terminate it
//!
//! Session credentials ride cookies on the injected `reqwest::Client`, so
//! callers share one cookie-enabled client between this provider and the
//! backend API client.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    CodeSent, ConsumeOutcome, ConsumeStatus, PasswordlessProvider, ResendOutcome,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Passwordless REST client.
#[derive(Clone)]
pub struct HttpPasswordlessProvider {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SendCodeRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    status: String,
    device_id: Option<String>,
    pre_auth_session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsumeCodeRequest<'a> {
    device_id: &'a str,
    pre_auth_session_id: &'a str,
    user_input_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConsumeCodeResponse {
    status: ConsumeStatus,
    user: Option<ConsumedUser>,
}

#[derive(Debug, Deserialize)]
struct ConsumedUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResendCodeRequest<'a> {
    device_id: &'a str,
    pre_auth_session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendCodeResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user_id: Option<String>,
}

impl HttpPasswordlessProvider {
    /// Create a new provider client.
    ///
    /// # Arguments
    /// * `http_client` - Shared cookie-enabled client; the session cookie set
    ///   on consume must be visible to every later call on this client
    /// * `base_url` - Origin the provider is mounted on (e.g., `https://app.clarity.dev`)
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a path under the provider's auth mount.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth{}", self.base_url, path)
    }

    /// Map a non-success response to an `Api` error, consuming the body
    /// into a log-safe summary.
    async fn api_error(operation: &str, response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        tracing::error!(status = %status, body_summary = %body_summary, operation, "Provider call failed");
        ProviderError::Api {
            status: status.as_u16(),
            body_summary,
        }
    }

    /// Fetch the current session, `None` when the provider reports 401.
    async fn fetch_session(&self) -> ProviderResult<Option<SessionResponse>> {
        let url = self.auth_url("/session");

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::api_error("fetch_session", response).await);
        }

        let session: SessionResponse = response.json().await?;
        Ok(Some(session))
    }
}

#[async_trait]
impl PasswordlessProvider for HttpPasswordlessProvider {
    async fn send_code(&self, email: &str) -> ProviderResult<CodeSent> {
        let url = self.auth_url("/signinup/code");

        tracing::debug!("Requesting login code from {}", url);

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(&SendCodeRequest { email })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error("send_code", response).await);
        }

        let parsed: SendCodeResponse = response.json().await?;
        if parsed.status != "OK" {
            return Err(ProviderError::SendRejected(parsed.status));
        }

        let device_id = parsed
            .device_id
            .ok_or_else(|| ProviderError::MalformedResponse("deviceId missing".to_string()))?;
        let pre_auth_session_id = parsed.pre_auth_session_id.ok_or_else(|| {
            ProviderError::MalformedResponse("preAuthSessionId missing".to_string())
        })?;

        tracing::debug!(device_id = %device_id, "Login code issued");
        Ok(CodeSent {
            device_id,
            pre_auth_session_id,
        })
    }

    async fn consume_code(
        &self,
        device_id: &str,
        pre_auth_session_id: &str,
        code: &str,
    ) -> ProviderResult<ConsumeOutcome> {
        let url = self.auth_url("/signinup/code/consume");

        tracing::debug!(device_id = %device_id, "Submitting login code");

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(&ConsumeCodeRequest {
                device_id,
                pre_auth_session_id,
                user_input_code: code,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error("consume_code", response).await);
        }

        let parsed: ConsumeCodeResponse = response.json().await?;
        let outcome = match parsed.status {
            ConsumeStatus::Ok => {
                let user = parsed.user.ok_or_else(|| {
                    ProviderError::MalformedResponse("user missing on OK consume".to_string())
                })?;
                ConsumeOutcome::Accepted {
                    user_id: user.id,
                    email: user.email,
                }
            }
            ConsumeStatus::IncorrectCode => ConsumeOutcome::IncorrectCode,
            ConsumeStatus::ExpiredCode => ConsumeOutcome::ExpiredCode,
            ConsumeStatus::RestartFlow => ConsumeOutcome::RestartFlow,
        };
        Ok(outcome)
    }

    async fn resend_code(
        &self,
        device_id: &str,
        pre_auth_session_id: &str,
    ) -> ProviderResult<ResendOutcome> {
        let url = self.auth_url("/signinup/code/resend");

        tracing::debug!(device_id = %device_id, "Requesting code re-delivery");

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(&ResendCodeRequest {
                device_id,
                pre_auth_session_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error("resend_code", response).await);
        }

        let parsed: ResendCodeResponse = response.json().await?;
        match parsed.status.as_str() {
            "OK" => Ok(ResendOutcome::Sent),
            "RESTART_FLOW" => Ok(ResendOutcome::RestartFlow),
            other => Err(ProviderError::UnexpectedStatus(other.to_string())),
        }
    }

    async fn session_exists(&self) -> ProviderResult<bool> {
        Ok(self.fetch_session().await?.is_some())
    }

    async fn user_id(&self) -> ProviderResult<Option<String>> {
        Ok(self.fetch_session().await?.and_then(|s| s.user_id))
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        let url = self.auth_url("/signout");

        tracing::debug!("Signing out of provider session");

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        // 401 here means the session is already gone, which is the goal.
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::api_error("sign_out", response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&data[..pos]).to_string();
                let content_length = headers
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if data.len() >= pos + 4 + content_length {
                    break;
                }
            }
        }
        data
    }

    /// Serves exactly one request with a canned response, then closes.
    async fn spawn_canned_server(status_line: &str, body: &str) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = read_request(&mut stream).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        addr
    }

    fn provider_for(addr: std::net::SocketAddr) -> HttpPasswordlessProvider {
        HttpPasswordlessProvider::new(reqwest::Client::new(), format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_send_code_success() {
        let addr = spawn_canned_server(
            "200 OK",
            r#"{"status":"OK","deviceId":"dev-1","preAuthSessionId":"pas-1"}"#,
        )
        .await;

        let sent = provider_for(addr).send_code("user@example.com").await.unwrap();
        assert_eq!(sent.device_id, "dev-1");
        assert_eq!(sent.pre_auth_session_id, "pas-1");
    }

    #[tokio::test]
    async fn test_send_code_rejected_status() {
        let addr = spawn_canned_server("200 OK", r#"{"status":"SIGN_IN_UP_NOT_ALLOWED"}"#).await;

        let err = provider_for(addr)
            .send_code("user@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::SendRejected(_)));
    }

    #[tokio::test]
    async fn test_send_code_missing_device_id() {
        let addr = spawn_canned_server("200 OK", r#"{"status":"OK"}"#).await;

        let err = provider_for(addr)
            .send_code("user@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_consume_code_accepted() {
        let addr = spawn_canned_server(
            "200 OK",
            r#"{"status":"OK","user":{"id":"user-9","email":"user@example.com"}}"#,
        )
        .await;

        let outcome = provider_for(addr)
            .consume_code("dev-1", "pas-1", "123456")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ConsumeOutcome::Accepted {
                user_id: "user-9".to_string(),
                email: Some("user@example.com".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_consume_code_incorrect() {
        let addr = spawn_canned_server("200 OK", r#"{"status":"INCORRECT_CODE"}"#).await;

        let outcome = provider_for(addr)
            .consume_code("dev-1", "pas-1", "000000")
            .await
            .unwrap();
        assert_eq!(outcome, ConsumeOutcome::IncorrectCode);
    }

    #[tokio::test]
    async fn test_session_absent_on_401() {
        let addr = spawn_canned_server("401 Unauthorized", r#"{"message":"unauthorised"}"#).await;

        let exists = provider_for(addr).session_exists().await.unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn test_session_present() {
        let addr = spawn_canned_server("200 OK", r#"{"userId":"user-9"}"#).await;

        let provider = provider_for(addr);
        assert!(provider.session_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let addr = spawn_canned_server("502 Bad Gateway", "").await;

        let err = provider_for(addr).session_exists().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_sign_out_tolerates_missing_session() {
        let addr = spawn_canned_server("401 Unauthorized", "").await;

        provider_for(addr).sign_out().await.unwrap();
    }
}
