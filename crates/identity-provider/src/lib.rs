//! Identity provider integration for the Clarity gate.
//!
//! This crate provides:
//! - The `PasswordlessProvider` trait the rest of the gate is written against
//! - An HTTP implementation speaking the provider's passwordless REST surface
//! - A fail-closed `SessionValidator` that turns provider failures into
//!   "no session" instead of letting errors escape

mod error;
mod http;
mod provider;
mod validator;

pub use error::{ProviderError, ProviderResult};
pub use http::HttpPasswordlessProvider;
pub use provider::{CodeSent, ConsumeOutcome, ConsumeStatus, PasswordlessProvider, ResendOutcome};
pub use validator::SessionValidator;
