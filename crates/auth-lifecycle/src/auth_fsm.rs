//! Authentication state machine using rust-fsm.
//!
//! The gate's lifecycle is an explicit finite state machine rather than a
//! set of boolean flags. Every phase the UI can observe is a state, and
//! every provider outcome is an input; transitions outside the table are
//! hard errors.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Initializing   │ (initial)
//! └────────┬────────┘
//!          │ ProfileComplete / ProfileIncomplete / NoSession
//!          ▼
//! ┌─────────────────┐  CodeSent   ┌─────────────────┐
//! │ Unauthenticated │ ──────────► │   OtpPending    │◄─┐ CodeSent / CodeRejected
//! └─────────────────┘             └────────┬────────┘──┘
//!          ▲                               │ CodeAccepted
//!          │ FlowRestarted                 ▼
//!          │                      ┌─────────────────┐
//!          ├──────────────────────│    Verifying    │
//!          │                      └────────┬────────┘
//!          │                               │ ProfileComplete / ProfileIncomplete
//!          │                               ▼
//!          │              ┌──────────────────────────────────┐
//!          │              │ AuthenticatedIncompleteProfile / │
//!          │              │      AuthenticatedComplete       │
//!          │              └────────────────┬─────────────────┘
//!          │                               │ SignOutRequested / SessionLost
//!          │ SignOutComplete               ▼
//!          │                      ┌─────────────────┐
//!          └──────────────────────│   SigningOut    │
//!                                 └─────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates a module `gate_machine` with State, Input, StateMachine and
// the transition impl.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub gate_machine(Initializing)

    Initializing => {
        ProfileComplete => AuthenticatedComplete,
        ProfileIncomplete => AuthenticatedIncompleteProfile,
        NoSession => Unauthenticated
    },
    Unauthenticated => {
        CodeSent => OtpPending
    },
    OtpPending => {
        // A fresh send or a resend keeps the flow pending.
        CodeSent => OtpPending,
        CodeAccepted => Verifying,
        CodeRejected => OtpPending,
        FlowRestarted => Unauthenticated
    },
    Verifying => {
        ProfileComplete => AuthenticatedComplete,
        ProfileIncomplete => AuthenticatedIncompleteProfile,
        SessionLost => SigningOut
    },
    AuthenticatedIncompleteProfile => {
        ProfileComplete => AuthenticatedComplete,
        ProfileIncomplete => AuthenticatedIncompleteProfile,
        SignOutRequested => SigningOut,
        SessionLost => SigningOut
    },
    AuthenticatedComplete => {
        ProfileComplete => AuthenticatedComplete,
        SignOutRequested => SigningOut,
        SessionLost => SigningOut
    },
    SigningOut => {
        SignOutComplete => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use gate_machine::Input as GateMachineInput;
pub use gate_machine::State as GateMachineState;
pub use gate_machine::StateMachine as GateMachine;

/// Lifecycle state as seen by the UI, routing and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Startup session probe has not finished yet.
    Initializing,
    /// No session; the login surface is shown.
    Unauthenticated,
    /// A one-time code was sent and awaits entry.
    OtpPending,
    /// Code accepted; resolving the profile.
    Verifying,
    /// Session holds but the profile still needs required fields.
    AuthenticatedIncompleteProfile,
    /// Fully signed in.
    AuthenticatedComplete,
    /// Local and provider sign-out in progress.
    SigningOut,
}

impl AuthState {
    /// True for both authenticated states, complete or not.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthState::AuthenticatedIncompleteProfile | AuthState::AuthenticatedComplete
        )
    }

    /// True for in-progress states during which the UI should hold.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::Initializing | AuthState::Verifying | AuthState::SigningOut
        )
    }
}

impl From<&GateMachineState> for AuthState {
    fn from(state: &GateMachineState) -> Self {
        match state {
            GateMachineState::Initializing => AuthState::Initializing,
            GateMachineState::Unauthenticated => AuthState::Unauthenticated,
            GateMachineState::OtpPending => AuthState::OtpPending,
            GateMachineState::Verifying => AuthState::Verifying,
            GateMachineState::AuthenticatedIncompleteProfile => {
                AuthState::AuthenticatedIncompleteProfile
            }
            GateMachineState::AuthenticatedComplete => AuthState::AuthenticatedComplete,
            GateMachineState::SigningOut => AuthState::SigningOut,
        }
    }
}

/// Payload for auth state change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current lifecycle state.
    pub state: AuthState,
    /// User ID if authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_initializing() {
        let machine = GateMachine::new();
        assert_eq!(*machine.state(), GateMachineState::Initializing);
    }

    #[test]
    fn test_startup_without_session_lands_unauthenticated() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::NoSession).unwrap();
        assert_eq!(*machine.state(), GateMachineState::Unauthenticated);
    }

    #[test]
    fn test_startup_with_complete_profile() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::ProfileComplete).unwrap();
        assert_eq!(*machine.state(), GateMachineState::AuthenticatedComplete);
    }

    #[test]
    fn test_full_login_flow() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::NoSession).unwrap();

        machine.consume(&GateMachineInput::CodeSent).unwrap();
        assert_eq!(*machine.state(), GateMachineState::OtpPending);

        machine.consume(&GateMachineInput::CodeAccepted).unwrap();
        assert_eq!(*machine.state(), GateMachineState::Verifying);

        machine.consume(&GateMachineInput::ProfileComplete).unwrap();
        assert_eq!(*machine.state(), GateMachineState::AuthenticatedComplete);
    }

    #[test]
    fn test_new_user_lands_in_incomplete_profile() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::NoSession).unwrap();
        machine.consume(&GateMachineInput::CodeSent).unwrap();
        machine.consume(&GateMachineInput::CodeAccepted).unwrap();
        machine
            .consume(&GateMachineInput::ProfileIncomplete)
            .unwrap();
        assert_eq!(
            *machine.state(),
            GateMachineState::AuthenticatedIncompleteProfile
        );

        // Completing the profile promotes the session.
        machine.consume(&GateMachineInput::ProfileComplete).unwrap();
        assert_eq!(*machine.state(), GateMachineState::AuthenticatedComplete);
    }

    #[test]
    fn test_resend_and_rejection_stay_pending() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::NoSession).unwrap();
        machine.consume(&GateMachineInput::CodeSent).unwrap();

        machine.consume(&GateMachineInput::CodeRejected).unwrap();
        assert_eq!(*machine.state(), GateMachineState::OtpPending);

        machine.consume(&GateMachineInput::CodeSent).unwrap();
        assert_eq!(*machine.state(), GateMachineState::OtpPending);
    }

    #[test]
    fn test_flow_restart_returns_to_unauthenticated() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::NoSession).unwrap();
        machine.consume(&GateMachineInput::CodeSent).unwrap();
        machine.consume(&GateMachineInput::FlowRestarted).unwrap();
        assert_eq!(*machine.state(), GateMachineState::Unauthenticated);
    }

    #[test]
    fn test_sign_out_flow() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::ProfileComplete).unwrap();

        machine
            .consume(&GateMachineInput::SignOutRequested)
            .unwrap();
        assert_eq!(*machine.state(), GateMachineState::SigningOut);

        machine.consume(&GateMachineInput::SignOutComplete).unwrap();
        assert_eq!(*machine.state(), GateMachineState::Unauthenticated);
    }

    #[test]
    fn test_session_loss_forces_sign_out_path() {
        let mut machine = GateMachine::new();
        machine
            .consume(&GateMachineInput::ProfileIncomplete)
            .unwrap();

        machine.consume(&GateMachineInput::SessionLost).unwrap();
        assert_eq!(*machine.state(), GateMachineState::SigningOut);

        machine.consume(&GateMachineInput::SignOutComplete).unwrap();
        assert_eq!(*machine.state(), GateMachineState::Unauthenticated);
    }

    #[test]
    fn test_cannot_skip_verification() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::NoSession).unwrap();
        machine.consume(&GateMachineInput::CodeSent).unwrap();

        // Profile resolution is only valid after the code is accepted.
        assert!(machine
            .consume(&GateMachineInput::ProfileComplete)
            .is_err());

        machine.consume(&GateMachineInput::CodeAccepted).unwrap();
        machine.consume(&GateMachineInput::ProfileComplete).unwrap();
        assert_eq!(*machine.state(), GateMachineState::AuthenticatedComplete);
    }

    #[test]
    fn test_invalid_transitions_error() {
        let mut machine = GateMachine::new();

        // Cannot send a code before the startup probe settles.
        assert!(machine.consume(&GateMachineInput::CodeSent).is_err());

        machine.consume(&GateMachineInput::NoSession).unwrap();

        // Cannot sign out or verify without a flow.
        assert!(machine
            .consume(&GateMachineInput::SignOutRequested)
            .is_err());
        assert!(machine.consume(&GateMachineInput::CodeAccepted).is_err());
    }

    #[test]
    fn test_complete_profile_cannot_be_demoted() {
        let mut machine = GateMachine::new();
        machine.consume(&GateMachineInput::ProfileComplete).unwrap();
        assert!(machine
            .consume(&GateMachineInput::ProfileIncomplete)
            .is_err());
        assert_eq!(*machine.state(), GateMachineState::AuthenticatedComplete);
    }

    #[test]
    fn test_auth_state_conversion() {
        assert_eq!(
            AuthState::from(&GateMachineState::Initializing),
            AuthState::Initializing
        );
        assert_eq!(
            AuthState::from(&GateMachineState::Unauthenticated),
            AuthState::Unauthenticated
        );
        assert_eq!(
            AuthState::from(&GateMachineState::OtpPending),
            AuthState::OtpPending
        );
        assert_eq!(
            AuthState::from(&GateMachineState::Verifying),
            AuthState::Verifying
        );
        assert_eq!(
            AuthState::from(&GateMachineState::AuthenticatedIncompleteProfile),
            AuthState::AuthenticatedIncompleteProfile
        );
        assert_eq!(
            AuthState::from(&GateMachineState::AuthenticatedComplete),
            AuthState::AuthenticatedComplete
        );
        assert_eq!(
            AuthState::from(&GateMachineState::SigningOut),
            AuthState::SigningOut
        );
    }

    #[test]
    fn test_auth_state_is_authenticated() {
        assert!(!AuthState::Initializing.is_authenticated());
        assert!(!AuthState::Unauthenticated.is_authenticated());
        assert!(!AuthState::OtpPending.is_authenticated());
        assert!(!AuthState::Verifying.is_authenticated());
        assert!(AuthState::AuthenticatedIncompleteProfile.is_authenticated());
        assert!(AuthState::AuthenticatedComplete.is_authenticated());
        assert!(!AuthState::SigningOut.is_authenticated());
    }

    #[test]
    fn test_auth_state_is_transient() {
        assert!(AuthState::Initializing.is_transient());
        assert!(!AuthState::Unauthenticated.is_transient());
        assert!(!AuthState::OtpPending.is_transient());
        assert!(AuthState::Verifying.is_transient());
        assert!(!AuthState::AuthenticatedIncompleteProfile.is_transient());
        assert!(!AuthState::AuthenticatedComplete.is_transient());
        assert!(AuthState::SigningOut.is_transient());
    }

    #[test]
    fn test_auth_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AuthState::OtpPending).unwrap(),
            "\"otp_pending\""
        );
        assert_eq!(
            serde_json::to_string(&AuthState::AuthenticatedIncompleteProfile).unwrap(),
            "\"authenticated_incomplete_profile\""
        );
    }
}
