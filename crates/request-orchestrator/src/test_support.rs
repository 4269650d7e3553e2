//! Shared fixtures for this crate's unit tests.

use async_trait::async_trait;
use identity_provider::{
    CodeSent, ConsumeOutcome, PasswordlessProvider, ProviderResult, ResendOutcome,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

/// Provider double whose session either always exists or never does.
pub struct StaticSessionProvider {
    pub exists: bool,
}

#[async_trait]
impl PasswordlessProvider for StaticSessionProvider {
    async fn send_code(&self, _email: &str) -> ProviderResult<CodeSent> {
        Ok(CodeSent {
            device_id: "dev".to_string(),
            pre_auth_session_id: "pas".to_string(),
        })
    }

    async fn consume_code(
        &self,
        _device_id: &str,
        _pre_auth_session_id: &str,
        _code: &str,
    ) -> ProviderResult<ConsumeOutcome> {
        Ok(ConsumeOutcome::IncorrectCode)
    }

    async fn resend_code(
        &self,
        _device_id: &str,
        _pre_auth_session_id: &str,
    ) -> ProviderResult<ResendOutcome> {
        Ok(ResendOutcome::Sent)
    }

    async fn session_exists(&self) -> ProviderResult<bool> {
        Ok(self.exists)
    }

    async fn user_id(&self) -> ProviderResult<Option<String>> {
        Ok(self.exists.then(|| "user-9".to_string()))
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        Ok(())
    }
}

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

/// Canned HTTP server handle.
pub struct CannedServer {
    pub addr: std::net::SocketAddr,
    pub connections: Arc<AtomicUsize>,
}

/// Serves every connection the same canned response, counting connections.
/// Responses are delayed by `delay` to widen concurrency windows in tests.
pub async fn spawn_server(
    status_line: &'static str,
    body: &'static str,
    delay: Duration,
) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let _ = read_request(&mut stream).await;
                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    CannedServer { addr, connections }
}
