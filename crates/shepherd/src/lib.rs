//! Shepherd: session bootstrap for the Ministry Media portal.
//!
//! Turns identity-provider events into a consistent session (identity plus
//! application profile), keeps it fresh, signs idle users out, and moves a
//! freshly signed-in user to the landing route.
//!
//! # Core Invariants
//!
//! 1. **Never stuck loading**: every profile load settles within its timeout,
//!    whether the fetch succeeds, fails, hangs, or is cancelled
//! 2. **Latest identity wins**: a fetch superseded by a newer event never
//!    writes to the store
//! 3. **Sign-out always clears**: local state is wiped even when the remote
//!    call fails
//! 4. **One redirect per sign-in**
//!
//! # Architecture
//!
//! ```text
//! IdentityProvider -> AuthStateMachine -> ProfileFetcher -> SessionStore
//!                                                               |
//!                           InactivityMonitor <-----------------+
//!                           RedirectCoordinator <---------------+
//! ```

pub mod activity;
pub mod auth_fsm;
pub mod error;
pub mod fetcher;
pub mod inactivity;
pub mod machine;
pub mod observer;
pub mod ports;
pub mod redirect;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use activity::{
    ActivityListener, ActivitySignal, ActivitySource, DocumentEvents, InputKind, Visibility,
};
pub use auth_fsm::{AuthState, SessionMachine, SessionMachineInput, SessionMachineState};
pub use error::{
    ProfileError, ProfileResult, ProfileStoreError, SessionError, SessionResult,
};
pub use fetcher::{ProfileFetcher, RetryPolicy};
pub use inactivity::{IdlePhase, IdleStatus, InactivityConfig, InactivityHandle, InactivityMonitor};
pub use machine::{AuthStateMachine, MachineConfig, SessionHandle};
pub use observer::{RecordingObserver, TracingObserver, Transition, TransitionObserver};
pub use ports::{
    AuthEventBus, AuthEventStream, IdentityProvider, Navigator, NotificationSink, ProfileStore,
};
pub use redirect::{RedirectConfig, RedirectCoordinator, RedirectHandle};
pub use store::SessionStore;
pub use types::{
    AuthEvent, AuthEventKind, Identity, NavigateOptions, Notification, NotificationVariant,
    Profile, Role, Session,
};
