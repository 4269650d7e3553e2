//! Concurrent-read deduplication.
//!
//! Collapses identical in-flight reads into one network call. The registry
//! keys on a (service, endpoint, method) fingerprint and hands every
//! concurrent caller a clone of the same shared future. A detached driver
//! task polls the shared future to completion, so the underlying call
//! settles and its registry entry is removed even if every caller stops
//! awaiting. Writes never go through here.

use crate::error::OrchestratorError;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Service a request is addressed to; part of the dedup fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// The dashboard backend (`/api/...`).
    Api,
    /// The identity provider mount (`/auth/...`).
    Auth,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Api => "api",
            ServiceKind::Auth => "auth",
        }
    }
}

/// Fingerprint of an idempotent read; the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint {
    service: ServiceKind,
    endpoint: String,
    method: &'static str,
}

impl RequestFingerprint {
    /// Fingerprint for a GET. Reads are the only calls the registry accepts.
    pub fn read(service: ServiceKind, endpoint: &str) -> Self {
        Self {
            service,
            endpoint: endpoint.to_string(),
            method: "GET",
        }
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.method, self.service.as_str(), self.endpoint)
    }
}

/// Settled response shared between collapsed callers. Always 2xx; failures
/// travel as the error side of [`SharedOutcome`].
#[derive(Debug, Clone)]
pub struct SharedResponse {
    pub status: u16,
    pub body: String,
}

/// Outcome every collapsed caller observes.
pub type SharedOutcome = Result<SharedResponse, Arc<OrchestratorError>>;

type InFlight = Shared<BoxFuture<'static, SharedOutcome>>;

/// Registry of in-flight idempotent reads.
#[derive(Clone, Default)]
pub struct PendingRequestRegistry {
    in_flight: Arc<Mutex<HashMap<RequestFingerprint, InFlight>>>,
}

impl PendingRequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reads currently in flight.
    pub fn len(&self) -> usize {
        self.in_flight.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Awaits the in-flight outcome for `fingerprint`, dispatching `call`
    /// only when no identical read is already running.
    ///
    /// The entry is installed before the call starts and removed inside the
    /// shared future itself, so removal runs exactly once on every exit
    /// path, success or failure.
    pub async fn dispatch<F>(&self, fingerprint: RequestFingerprint, call: F) -> SharedOutcome
    where
        F: Future<Output = SharedOutcome> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().expect("lock poisoned");
            if let Some(existing) = in_flight.get(&fingerprint) {
                debug!(fingerprint = %fingerprint, "Joining in-flight read");
                existing.clone()
            } else {
                let registry = Arc::clone(&self.in_flight);
                let key = fingerprint.clone();
                let shared: InFlight = async move {
                    let outcome = call.await;
                    registry.lock().expect("lock poisoned").remove(&key);
                    outcome
                }
                .boxed()
                .shared();
                in_flight.insert(fingerprint, shared.clone());
                // Driver task: settlement must not depend on callers staying
                // subscribed.
                tokio::spawn(shared.clone());
                shared
            }
        };
        shared.await
    }
}
