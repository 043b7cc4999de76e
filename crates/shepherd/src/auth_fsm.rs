//! Session bootstrap state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Uninitialized  │ (initial)
//! └────────┬────────┘
//!          │ IdentityPresent                 IdentityAbsent
//!          ▼                                       │
//! ┌─────────────────┐                              │
//! │     Loading     │ ◄── IdentityPresent ──┐      │
//! └────────┬────────┘     RefreshRequested  │      │
//!          │                                │      │
//!          │ ProfileLoaded / ProfileFailed  │      │
//!          ▼                                │      ▼
//! ┌──────────────────────────┐     ┌─────────────────┐
//! │ AuthenticatedWithProfile │     │ Unauthenticated │
//! │ AuthenticatedProfileError│ ──► │                 │
//! └──────────────────────────┘     └─────────────────┘
//!              IdentityAbsent / SignOutRequested
//! ```
//!
//! Any state with an identity goes back to `Loading` when a fresh identity
//! event arrives; every state drops to `Unauthenticated` when the identity
//! disappears.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        IdentityPresent => Loading,
        IdentityAbsent => Unauthenticated,
        SignOutRequested => Unauthenticated
    },
    Loading => {
        // A newer identity event or a manual refresh supersedes the fetch in flight
        IdentityPresent => Loading,
        RefreshRequested => Loading,
        ProfileLoaded => AuthenticatedWithProfile,
        ProfileFailed => AuthenticatedProfileError,
        IdentityAbsent => Unauthenticated,
        SignOutRequested => Unauthenticated
    },
    AuthenticatedWithProfile => {
        IdentityPresent => Loading,
        RefreshRequested => Loading,
        IdentityAbsent => Unauthenticated,
        SignOutRequested => Unauthenticated
    },
    AuthenticatedProfileError => {
        IdentityPresent => Loading,
        RefreshRequested => Loading,
        IdentityAbsent => Unauthenticated,
        SignOutRequested => Unauthenticated
    },
    Unauthenticated => {
        IdentityPresent => Loading,
        IdentityAbsent => Unauthenticated,
        SignOutRequested => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Externally visible session state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No identity event processed yet.
    Uninitialized,
    /// Identity known, profile being fetched.
    Loading,
    /// Identity and profile available.
    AuthenticatedWithProfile,
    /// Identity usable, profile unavailable.
    AuthenticatedProfileError,
    /// No identity.
    Unauthenticated,
}

impl AuthState {
    /// Returns true if an identity is held (with or without profile).
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthState::AuthenticatedWithProfile | AuthState::AuthenticatedProfileError
        )
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Uninitialized => AuthState::Uninitialized,
            SessionMachineState::Loading => AuthState::Loading,
            SessionMachineState::AuthenticatedWithProfile => AuthState::AuthenticatedWithProfile,
            SessionMachineState::AuthenticatedProfileError => AuthState::AuthenticatedProfileError,
            SessionMachineState::Unauthenticated => AuthState::Unauthenticated,
        }
    }
}
