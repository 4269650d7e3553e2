//! Session lifecycle for the Clarity dashboard gate.
//!
//! This crate provides:
//! - Explicit FSM-based auth state management for the passwordless flow
//! - OTP challenge bookkeeping with resend cooldown and attempt limits
//! - Local validation of emails, codes and profile fields
//! - A runtime that composes the identity provider, the profile store and
//!   the access evaluator behind one handle
//! - Background loops for session refresh and cooldown countdown

mod auth_fsm;
mod challenge;
mod config;
mod error;
mod identity;
mod runtime;
mod validation;

pub use auth_fsm::gate_machine;
pub use auth_fsm::{
    AuthState, AuthStateChangedPayload, GateMachine, GateMachineInput, GateMachineState,
};
pub use challenge::OtpChallenge;
pub use config::{
    GateConfig, DEFAULT_MAX_OTP_ATTEMPTS, DEFAULT_MIN_OTP_CODE_LEN, DEFAULT_RESEND_COOLDOWN_SECS,
    DEFAULT_SESSION_REFRESH_INTERVAL_SECS,
};
pub use error::{AuthFlowError, AuthResult, ErrorKind, SurfacedError};
pub use identity::{AuthenticatedIdentity, ProfileFields};
pub use runtime::{AuthRuntime, AuthSnapshot, AuthStateCallback};
pub use validation::{validate_email, validate_otp_code, validate_profile_fields, MIN_PROFILE_FIELD_LEN};
