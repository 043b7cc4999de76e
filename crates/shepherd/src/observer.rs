//! Structured transition telemetry.
//!
//! The runtime reports every meaningful step through a [`TransitionObserver`]
//! instead of ad hoc log lines, so tests can assert on sequences and hosts
//! can forward them wherever they like.

use crate::auth_fsm::AuthState;
use crate::types::AuthEventKind;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One observable step of the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// An identity-provider event was accepted for processing.
    EventReceived { kind: AuthEventKind, has_identity: bool },
    /// The session FSM moved between states.
    StateChanged { from: AuthState, to: AuthState },
    /// A profile fetch started for an identity.
    ProfileFetchStarted { user_id: String },
    /// The profile row was missing; waiting once before retrying.
    ProfileGraceWait { user_id: String, delay: Duration },
    /// A transient failure; another attempt is scheduled.
    ProfileFetchRetry { user_id: String, attempt: u32, delay: Duration },
    ProfileLoaded { user_id: String },
    ProfileFailed { user_id: String, message: String },
    /// A fetch finished after its identity was superseded; result dropped.
    StaleResultDiscarded { user_id: String },
    /// Remote sign-out failed; local state was cleared anyway.
    SignOutFailed { message: String },
    SignedOut,
    InactivityWarning,
    InactivityTimeout,
    /// Redirect coordinator navigated to the landing route.
    RedirectIssued { path: String, fallback: bool },
}

/// Receives [`Transition`]s as they happen.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, transition: &Transition);
}

/// Default observer: turns transitions into `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransitionObserver for TracingObserver {
    fn on_transition(&self, transition: &Transition) {
        match transition {
            Transition::EventReceived { kind, has_identity } => {
                debug!(kind = ?kind, has_identity, "Identity event received")
            }
            Transition::StateChanged { from, to } => {
                debug!(old_state = ?from, new_state = ?to, "Session state transition")
            }
            Transition::ProfileFetchStarted { user_id } => {
                debug!(user_id = %user_id, "Fetching profile")
            }
            Transition::ProfileGraceWait { user_id, delay } => info!(
                user_id = %user_id,
                delay_ms = delay.as_millis() as u64,
                "Profile not provisioned yet, waiting before retry"
            ),
            Transition::ProfileFetchRetry {
                user_id,
                attempt,
                delay,
            } => warn!(
                user_id = %user_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Profile fetch failed, retrying"
            ),
            Transition::ProfileLoaded { user_id } => info!(user_id = %user_id, "Profile loaded"),
            Transition::ProfileFailed { user_id, message } => {
                warn!(user_id = %user_id, error = %message, "Profile unavailable")
            }
            Transition::StaleResultDiscarded { user_id } => {
                debug!(user_id = %user_id, "Discarding stale profile result")
            }
            Transition::SignOutFailed { message } => {
                warn!(error = %message, "Remote sign-out failed, local session cleared")
            }
            Transition::SignedOut => info!("Signed out"),
            Transition::InactivityWarning => info!("Inactivity warning shown"),
            Transition::InactivityTimeout => info!("Signing out after inactivity"),
            Transition::RedirectIssued { path, fallback } => {
                info!(path = %path, fallback, "Redirecting after sign-in")
            }
        }
    }
}

/// Observer that keeps every transition in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    transitions: Mutex<Vec<Transition>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.lock().clone()
    }

    /// Just the FSM target states, in order.
    pub fn states(&self) -> Vec<AuthState> {
        self.transitions
            .lock()
            .iter()
            .filter_map(|t| match t {
                Transition::StateChanged { to, .. } => Some(to.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Transition) -> bool) -> usize {
        self.transitions.lock().iter().filter(|t| predicate(t)).count()
    }
}

impl TransitionObserver for RecordingObserver {
    fn on_transition(&self, transition: &Transition) {
        TracingObserver.on_transition(transition);
        self.transitions.lock().push(transition.clone());
    }
}
