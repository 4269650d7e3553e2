//! The gate runtime.
//!
//! Owns the state machine, the active challenge, the authenticated
//! identity and the parked error, and drives them through the identity
//! provider and the profile store. All services are injected; the
//! composition root decides lifetimes.

use std::sync::{Arc, Mutex};

use access_control::AccessEvaluator;
use identity_provider::{ConsumeOutcome, PasswordlessProvider, ResendOutcome, SessionValidator};
use request_orchestrator::{
    poll_until, CreateProfileRequest, ProfileRecord, ProfileService, UpdateProfileRequest,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth_fsm::{AuthState, AuthStateChangedPayload, GateMachine, GateMachineInput};
use crate::challenge::OtpChallenge;
use crate::config::GateConfig;
use crate::error::{AuthFlowError, AuthResult, SurfacedError};
use crate::identity::{AuthenticatedIdentity, ProfileFields};
use crate::validation::{validate_email, validate_otp_code, validate_profile_fields};

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

/// Point-in-time view of the runtime, safe to serialize for UIs and the
/// CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub is_authenticated: bool,
    /// True while a transient state holds and the UI should wait.
    pub is_busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SurfacedError>,
    /// Seconds until resend unlocks, while a challenge is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_resend_cooldown: Option<u32>,
    /// Wrong codes entered against the active challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_attempts: Option<u32>,
}

struct RuntimeInner {
    provider: Arc<dyn PasswordlessProvider>,
    validator: SessionValidator,
    profiles: Arc<dyn ProfileService>,
    evaluator: Arc<AccessEvaluator>,
    config: GateConfig,
    fsm: Mutex<GateMachine>,
    identity: Mutex<Option<AuthenticatedIdentity>>,
    challenge: Mutex<Option<OtpChallenge>>,
    last_error: Mutex<Option<SurfacedError>>,
    state_callback: Mutex<Option<AuthStateCallback>>,
}

impl RuntimeInner {
    fn public_state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().expect("lock poisoned").state())
    }

    /// Transition the FSM and notify the callback if the state changed.
    /// Every accepted input also wipes the parked error, self-loops
    /// included.
    fn transition(&self, input: &GateMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock().expect("lock poisoned");
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| AuthFlowError::InvalidTransition {
            input: format!("{input:?}"),
            state: format!("{:?}", fsm.state()),
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        self.last_error.lock().expect("lock poisoned").take();

        if old_state != new_state {
            debug!(?old_state, ?new_state, "Auth state transition");
            self.notify_state_change(&new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: &AuthState) {
        let callback = self.state_callback.lock().expect("lock poisoned");
        if let Some(callback) = callback.as_ref() {
            let (user_id, email) = {
                let identity = self.identity.lock().expect("lock poisoned");
                identity
                    .as_ref()
                    .map(|identity| (Some(identity.user_id.clone()), identity.email.clone()))
                    .unwrap_or((None, None))
            };
            callback(AuthStateChangedPayload {
                state: state.clone(),
                user_id,
                email,
            });
        }
    }

    /// Parks an error for the UI and hands it back for propagation.
    fn park(&self, err: AuthFlowError) -> AuthFlowError {
        *self.last_error.lock().expect("lock poisoned") = Some(SurfacedError::from(&err));
        err
    }

    /// Replaces the identity and recomputes the permission map in the
    /// same breath, so access answers never lag the identity.
    fn set_identity(&self, identity: Option<AuthenticatedIdentity>) {
        self.evaluator
            .recompute(identity.as_ref().map(AuthenticatedIdentity::access_context));
        *self.identity.lock().expect("lock poisoned") = identity;
    }

    fn clear_challenge(&self) {
        *self.challenge.lock().expect("lock poisoned") = None;
    }

    fn install_profile_record(&self, record: ProfileRecord) -> AuthResult<AuthState> {
        let identity = AuthenticatedIdentity::from_record(record);
        let complete = identity.is_profile_complete();
        self.set_identity(Some(identity));
        if complete {
            self.transition(&GateMachineInput::ProfileComplete)
        } else {
            self.transition(&GateMachineInput::ProfileIncomplete)
        }
    }

    /// Local teardown that always succeeds. The provider call is
    /// best-effort; its failure never blocks the reset.
    async fn force_sign_out(&self) {
        let _ = self.transition(&GateMachineInput::SessionLost);
        if !self.validator.sign_out().await {
            warn!("Provider sign-out failed, clearing local session anyway");
        }
        self.clear_challenge();
        self.set_identity(None);
        let _ = self.transition(&GateMachineInput::SignOutComplete);
    }

    async fn initialize(&self) -> AuthResult<AuthState> {
        let state = self.public_state();
        if state != AuthState::Initializing {
            return Err(self.park(AuthFlowError::Validation(format!(
                "initialize is only valid at startup, not in state {state:?}"
            ))));
        }

        if !self.validator.session_exists().await {
            info!("No session at startup");
            return self.transition(&GateMachineInput::NoSession);
        }

        match self.profiles.fetch_profile().await {
            Ok(Some(record)) => {
                info!(user_id = %record.user_id, "Session and profile found at startup");
                self.install_profile_record(record)
            }
            Ok(None) => match self.validator.user_id().await {
                Some(user_id) => {
                    info!(user_id = %user_id, "Session without stored profile at startup");
                    self.set_identity(Some(AuthenticatedIdentity::synthesized(user_id, None)));
                    self.transition(&GateMachineInput::ProfileIncomplete)
                }
                None => {
                    warn!("Session reported but no user id available, treating as signed out");
                    self.transition(&GateMachineInput::NoSession)
                }
            },
            Err(err) => {
                warn!(error = %err, "Profile fetch failed at startup");
                let flow_err = AuthFlowError::from(err);
                self.transition(&GateMachineInput::NoSession)?;
                Err(self.park(flow_err))
            }
        }
    }

    async fn send_otp(&self, raw_email: &str) -> AuthResult<()> {
        let state = self.public_state();
        if !matches!(state, AuthState::Unauthenticated | AuthState::OtpPending) {
            return Err(self.park(AuthFlowError::InvalidTransition {
                input: "CodeSent".to_string(),
                state: format!("{state:?}"),
            }));
        }

        let email = match validate_email(raw_email) {
            Ok(email) => email,
            Err(err) => return Err(self.park(err)),
        };

        // Cooldown gate runs before any provider contact.
        {
            let challenge = self.challenge.lock().expect("lock poisoned");
            if let Some(challenge) = challenge.as_ref() {
                if !challenge.can_resend() {
                    let secs = challenge.cooldown_seconds_remaining;
                    return Err(self.park(AuthFlowError::RateLimit(format!(
                        "Please wait {secs}s before requesting another code"
                    ))));
                }
            }
        }

        match self.provider.send_code(&email).await {
            Ok(sent) => {
                info!(email = %email, "Login code sent");
                *self.challenge.lock().expect("lock poisoned") = Some(OtpChallenge::new(
                    email,
                    sent,
                    self.config.resend_cooldown_secs,
                ));
                self.transition(&GateMachineInput::CodeSent)?;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Sending login code failed");
                Err(self.park(err.into()))
            }
        }
    }

    async fn verify_otp(&self, raw_code: &str) -> AuthResult<AuthState> {
        if self.public_state() != AuthState::OtpPending {
            return Err(self.park(AuthFlowError::Validation(
                "No login code is awaiting entry".to_string(),
            )));
        }

        let code = match validate_otp_code(raw_code, self.config.min_otp_code_len) {
            Ok(code) => code,
            Err(err) => return Err(self.park(err)),
        };

        let (device_id, pre_auth_session_id, challenge_email) = {
            let challenge = self.challenge.lock().expect("lock poisoned");
            match challenge.as_ref() {
                Some(challenge) => {
                    if challenge.attempts_exhausted(self.config.max_otp_attempts) {
                        return Err(self.park(AuthFlowError::RateLimit(
                            "Too many incorrect codes. Request a new one.".to_string(),
                        )));
                    }
                    (
                        challenge.device_id.clone(),
                        challenge.pre_auth_session_id.clone(),
                        challenge.email.clone(),
                    )
                }
                None => {
                    return Err(self.park(AuthFlowError::Validation(
                        "No login code is awaiting entry".to_string(),
                    )))
                }
            }
        };

        match self
            .provider
            .consume_code(&device_id, &pre_auth_session_id, &code)
            .await
        {
            Ok(ConsumeOutcome::Accepted { user_id, email }) => {
                info!(user_id = %user_id, "Login code accepted");
                self.clear_challenge();
                self.transition(&GateMachineInput::CodeAccepted)?;
                self.resolve_profile_after_verify(user_id, email.or(Some(challenge_email)))
                    .await
            }
            Ok(ConsumeOutcome::IncorrectCode) => {
                let remaining = {
                    let mut challenge = self.challenge.lock().expect("lock poisoned");
                    match challenge.as_mut() {
                        Some(challenge) => {
                            challenge.record_failed_attempt();
                            challenge.attempts_remaining(self.config.max_otp_attempts)
                        }
                        None => 0,
                    }
                };
                warn!(remaining, "Incorrect login code");
                let _ = self.transition(&GateMachineInput::CodeRejected);
                Err(self.park(AuthFlowError::Authentication(format!(
                    "Incorrect code. {remaining} attempts remaining."
                ))))
            }
            Ok(ConsumeOutcome::ExpiredCode) => {
                warn!("Login code expired");
                Err(self.park(AuthFlowError::Authentication(
                    "That code has expired. Request a new one.".to_string(),
                )))
            }
            Ok(ConsumeOutcome::RestartFlow) => {
                warn!("Provider invalidated the login flow");
                self.clear_challenge();
                let _ = self.transition(&GateMachineInput::FlowRestarted);
                Err(self.park(AuthFlowError::Authentication(
                    "The login flow expired. Start over.".to_string(),
                )))
            }
            Err(err) => {
                warn!(error = %err, "Verifying login code failed");
                Err(self.park(err.into()))
            }
        }
    }

    /// The profile store can lag code consumption, so absence right after
    /// verification is polled through before declaring a new user.
    async fn resolve_profile_after_verify(
        &self,
        user_id: String,
        email: Option<String>,
    ) -> AuthResult<AuthState> {
        let profiles = self.profiles.clone();
        let fetched = poll_until(&self.config.profile_poll, "profile after verify", || {
            let profiles = profiles.clone();
            async move { profiles.fetch_profile().await }
        })
        .await;

        match fetched {
            Ok(Some(record)) => self.install_profile_record(record),
            Ok(None) => {
                info!(user_id = %user_id, "No stored profile after verification, new user");
                self.set_identity(Some(AuthenticatedIdentity::synthesized(user_id, email)));
                self.transition(&GateMachineInput::ProfileIncomplete)
            }
            Err(err) if err.is_authentication() => {
                warn!(error = %err, "Session rejected while resolving the profile");
                let flow_err = AuthFlowError::from(err);
                self.force_sign_out().await;
                Err(self.park(flow_err))
            }
            Err(err) => {
                // The session is established; a profile-store blip must not
                // undo the login. Surface the error and continue as
                // incomplete.
                warn!(error = %err, "Profile fetch failed after verification");
                let flow_err = AuthFlowError::from(err);
                self.set_identity(Some(AuthenticatedIdentity::synthesized(user_id, email)));
                let state = self.transition(&GateMachineInput::ProfileIncomplete)?;
                let _ = self.park(flow_err);
                Ok(state)
            }
        }
    }

    async fn resend_otp(&self) -> AuthResult<()> {
        if self.public_state() != AuthState::OtpPending {
            return Err(self.park(AuthFlowError::Validation(
                "No login code to resend".to_string(),
            )));
        }

        let (device_id, pre_auth_session_id) = {
            let challenge = self.challenge.lock().expect("lock poisoned");
            match challenge.as_ref() {
                Some(challenge) if !challenge.can_resend() => {
                    let secs = challenge.cooldown_seconds_remaining;
                    return Err(self.park(AuthFlowError::RateLimit(format!(
                        "Please wait {secs}s before requesting another code"
                    ))));
                }
                Some(challenge) => (
                    challenge.device_id.clone(),
                    challenge.pre_auth_session_id.clone(),
                ),
                None => {
                    return Err(self.park(AuthFlowError::Validation(
                        "No login code to resend".to_string(),
                    )))
                }
            }
        };

        match self
            .provider
            .resend_code(&device_id, &pre_auth_session_id)
            .await
        {
            Ok(ResendOutcome::Sent) => {
                info!("Login code resent");
                if let Some(challenge) = self.challenge.lock().expect("lock poisoned").as_mut() {
                    challenge.reset(self.config.resend_cooldown_secs);
                }
                self.transition(&GateMachineInput::CodeSent)?;
                Ok(())
            }
            Ok(ResendOutcome::RestartFlow) => {
                warn!("Provider invalidated the login flow on resend");
                self.clear_challenge();
                let _ = self.transition(&GateMachineInput::FlowRestarted);
                Err(self.park(AuthFlowError::Authentication(
                    "The login flow expired. Start over.".to_string(),
                )))
            }
            Err(err) => {
                warn!(error = %err, "Resending login code failed");
                Err(self.park(err.into()))
            }
        }
    }

    async fn update_profile(&self, fields: &ProfileFields) -> AuthResult<AuthState> {
        if !self.public_state().is_authenticated() {
            return Err(self.park(AuthFlowError::Authentication(
                "Sign in before editing the profile".to_string(),
            )));
        }

        let valid = match validate_profile_fields(fields) {
            Ok(valid) => valid,
            Err(err) => return Err(self.park(err)),
        };

        let (user_id, email, has_stored) = {
            let identity = self.identity.lock().expect("lock poisoned");
            match identity.as_ref() {
                Some(identity) => (
                    identity.user_id.clone(),
                    identity.email.clone(),
                    identity.has_stored_profile(),
                ),
                None => {
                    return Err(self.park(AuthFlowError::Authentication(
                        "Sign in before editing the profile".to_string(),
                    )))
                }
            }
        };

        let saved = if has_stored {
            self.profiles
                .update_profile(&UpdateProfileRequest::new(
                    valid.first_name.clone(),
                    valid.last_name.clone(),
                    valid.company.clone(),
                    valid.job_title.clone(),
                ))
                .await
        } else {
            self.profiles
                .create_profile(&CreateProfileRequest {
                    user_id: user_id.clone(),
                    email: email.unwrap_or_default(),
                    first_name: valid.first_name.clone(),
                    last_name: valid.last_name.clone(),
                    company: valid.company.clone(),
                    job_title: valid.job_title.clone(),
                })
                .await
        };

        match saved {
            Ok(record) => {
                info!(user_id = %record.user_id, created = !has_stored, "Profile saved");
                self.install_profile_record(record)
                    .map_err(|err| self.park(err))
            }
            Err(err) if err.is_authentication() => {
                warn!(error = %err, "Session rejected while saving the profile");
                let flow_err = AuthFlowError::from(err);
                self.force_sign_out().await;
                Err(self.park(flow_err))
            }
            Err(err) => {
                warn!(error = %err, "Saving profile failed");
                Err(self.park(err.into()))
            }
        }
    }

    async fn refresh_user(&self) -> AuthResult<()> {
        if !self.public_state().is_authenticated() {
            return Ok(());
        }

        if !self.validator.session_exists().await {
            info!("Session no longer present, signing out locally");
            self.force_sign_out().await;
            return Err(self.park(AuthFlowError::Authentication(
                "Your session has ended. Sign in again.".to_string(),
            )));
        }

        match self.profiles.fetch_profile().await {
            Ok(Some(record)) => {
                let identity = AuthenticatedIdentity::from_record(record);
                let complete = identity.is_profile_complete();
                if self.public_state() == AuthState::AuthenticatedComplete && !complete {
                    // Never demote a completed session over a refresh read.
                    warn!("Refreshed profile is missing required fields, keeping current identity");
                    return Ok(());
                }
                debug!(user_id = %identity.user_id, "Profile refreshed");
                self.set_identity(Some(identity));
                let input = if complete {
                    GateMachineInput::ProfileComplete
                } else {
                    GateMachineInput::ProfileIncomplete
                };
                let _ = self.transition(&input);
                Ok(())
            }
            Ok(None) => {
                warn!("Profile disappeared during refresh, keeping current identity");
                Ok(())
            }
            Err(err) if err.is_authentication() => {
                warn!(error = %err, "Session rejected during refresh");
                let flow_err = AuthFlowError::from(err);
                self.force_sign_out().await;
                Err(self.park(flow_err))
            }
            Err(err) => {
                // Background cadence will try again; a blip is not worth
                // disturbing the UI.
                debug!(error = %err, "Profile refresh failed");
                Ok(())
            }
        }
    }

    /// Idempotent local reset. Provider sign-out is attempted but never
    /// required to succeed.
    async fn sign_out(&self) -> AuthState {
        let state = self.public_state();
        match state {
            AuthState::AuthenticatedIncompleteProfile | AuthState::AuthenticatedComplete => {
                let _ = self.transition(&GateMachineInput::SignOutRequested);
                if !self.validator.sign_out().await {
                    warn!("Provider sign-out failed, clearing local session anyway");
                }
                self.clear_challenge();
                self.set_identity(None);
                let _ = self.transition(&GateMachineInput::SignOutComplete);
            }
            AuthState::OtpPending => {
                self.clear_challenge();
                let _ = self.transition(&GateMachineInput::FlowRestarted);
            }
            _ => {
                debug!(?state, "Sign-out requested with nothing to clear");
            }
        }
        self.last_error.lock().expect("lock poisoned").take();
        self.public_state()
    }

    fn snapshot(&self) -> AuthSnapshot {
        let state = self.public_state();
        let user = self.identity.lock().expect("lock poisoned").clone();
        let error = self.last_error.lock().expect("lock poisoned").clone();
        let (otp_resend_cooldown, otp_attempts) = {
            let challenge = self.challenge.lock().expect("lock poisoned");
            match challenge.as_ref() {
                Some(challenge) => (
                    Some(challenge.cooldown_seconds_remaining),
                    Some(challenge.attempts),
                ),
                None => (None, None),
            }
        };
        AuthSnapshot {
            is_authenticated: state.is_authenticated(),
            is_busy: state.is_transient(),
            state,
            user,
            error,
            otp_resend_cooldown,
            otp_attempts,
        }
    }

    async fn refresh_pass(&self) {
        if self.public_state().is_authenticated() {
            if let Err(err) = self.refresh_user().await {
                debug!(error = %err, "Background refresh pass failed");
            }
        }
    }

    fn cooldown_pass(&self) {
        if let Some(challenge) = self.challenge.lock().expect("lock poisoned").as_mut() {
            challenge.tick();
        }
    }
}

/// Composition of the gate: lifecycle operations, background loops and
/// access queries behind one handle.
///
/// Cloning is intentionally not offered; the composition root owns the
/// runtime and hands out references.
pub struct AuthRuntime {
    inner: Arc<RuntimeInner>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    cooldown_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthRuntime {
    pub fn new(
        provider: Arc<dyn PasswordlessProvider>,
        profiles: Arc<dyn ProfileService>,
        evaluator: Arc<AccessEvaluator>,
        config: GateConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                validator: SessionValidator::new(provider.clone()),
                provider,
                profiles,
                evaluator,
                config,
                fsm: Mutex::new(GateMachine::new()),
                identity: Mutex::new(None),
                challenge: Mutex::new(None),
                last_error: Mutex::new(None),
                state_callback: Mutex::new(None),
            }),
            refresh_task: Mutex::new(None),
            cooldown_task: Mutex::new(None),
        }
    }

    /// Set a callback to be notified whenever the public state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        *self.inner.state_callback.lock().expect("lock poisoned") = Some(callback);
    }

    pub fn state(&self) -> AuthState {
        self.inner.public_state()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot()
    }

    pub fn last_error(&self) -> Option<SurfacedError> {
        self.inner.last_error.lock().expect("lock poisoned").clone()
    }

    pub fn clear_error(&self) {
        self.inner.last_error.lock().expect("lock poisoned").take();
    }

    pub fn evaluator(&self) -> Arc<AccessEvaluator> {
        self.inner.evaluator.clone()
    }

    /// Startup probe: resolves the stored session into one of the three
    /// settled states. Valid exactly once, from `Initializing`.
    pub async fn initialize(&self) -> AuthResult<AuthState> {
        self.inner.initialize().await
    }

    /// Sends a login code and opens a challenge. Also restarts an
    /// existing flow once its cooldown has expired.
    pub async fn send_otp(&self, email: &str) -> AuthResult<()> {
        self.inner.send_otp(email).await
    }

    /// Submits a user-entered code against the active challenge.
    pub async fn verify_otp(&self, code: &str) -> AuthResult<AuthState> {
        self.inner.verify_otp(code).await
    }

    /// Asks the provider to re-deliver the code for the active challenge.
    pub async fn resend_otp(&self) -> AuthResult<()> {
        self.inner.resend_otp().await
    }

    /// Persists the profile form and promotes the session to
    /// `AuthenticatedComplete`.
    pub async fn update_profile(&self, fields: &ProfileFields) -> AuthResult<AuthState> {
        self.inner.update_profile(fields).await
    }

    /// Re-validates the session and picks up server-side profile changes.
    pub async fn refresh_user(&self) -> AuthResult<()> {
        self.inner.refresh_user().await
    }

    /// Signs out. Local state is always cleared; the provider call is
    /// best-effort. Background loops stop until explicitly restarted.
    pub async fn sign_out(&self) -> AuthState {
        let state = self.inner.sign_out().await;
        self.stop_background_tasks();
        state
    }

    pub async fn is_access_granted(&self, required: &[&str]) -> bool {
        self.inner.evaluator.is_access_granted(required).await
    }

    pub async fn has_role(&self, role: &str) -> bool {
        self.inner.evaluator.has_role(role).await
    }

    pub async fn can_access_route(&self, route: &str) -> bool {
        self.inner.evaluator.can_access_route(route).await
    }

    /// Starts the session-refresh and cooldown-countdown loops. Idempotent;
    /// call again after `sign_out` if the process keeps running.
    pub fn start_background_tasks(&self) {
        {
            let mut task = self.refresh_task.lock().expect("lock poisoned");
            if task.is_none() {
                let inner = self.inner.clone();
                *task = Some(tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(inner.config.session_refresh_interval);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        inner.refresh_pass().await;
                    }
                }));
            }
        }
        let mut task = self.cooldown_task.lock().expect("lock poisoned");
        if task.is_none() {
            let inner = self.inner.clone();
            *task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(inner.config.cooldown_tick_interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    inner.cooldown_pass();
                }
            }));
        }
    }

    /// Cancels both background loops. Safe to call any number of times.
    pub fn stop_background_tasks(&self) {
        if let Some(task) = self.refresh_task.lock().expect("lock poisoned").take() {
            task.abort();
        }
        if let Some(task) = self.cooldown_task.lock().expect("lock poisoned").take() {
            task.abort();
        }
    }
}

impl Drop for AuthRuntime {
    fn drop(&mut self) {
        self.stop_background_tasks();
    }
}
