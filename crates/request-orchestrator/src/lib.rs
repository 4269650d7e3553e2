//! Request orchestration for the Clarity gate.
//!
//! Wraps every backend call with the same pipeline:
//! - Session enforcement through the fail-closed validator, with a redirect
//!   signal whenever authentication is missing or rejected
//! - Standard headers and cookie-borne credentials
//! - Concurrent-read deduplication through a pending-request registry
//! - Error payload parsing into discriminated error kinds
//!
//! Resilience is opt-in: `retry_with_backoff` for exponential backoff and
//! `poll_until` for bounded fixed-delay polling, neither applied
//! automatically.

mod client;
mod dedup;
mod error;
mod profile;
mod retry;
#[cfg(test)]
mod test_support;

pub use client::{ApiClient, RedirectCallback, RedirectReason};
pub use dedup::{PendingRequestRegistry, RequestFingerprint, ServiceKind, SharedResponse};
pub use error::{OrchestratorError, OrchestratorResult};
pub use profile::{
    CreateProfileRequest, ProfileApi, ProfileDetails, ProfileMetadata, ProfileRecord,
    ProfileService, UpdateProfileRequest,
};
pub use retry::{
    poll_until, retry_with_backoff, PollConfig, RetryConfig, DEFAULT_INITIAL_DELAY_MS,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
};
