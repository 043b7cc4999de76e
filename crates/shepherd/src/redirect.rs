//! Post-sign-in navigation.
//!
//! Watches session snapshots and navigates to the landing route once per
//! sign-in: as soon as the profile is available or has terminally failed,
//! or after a bounded fallback wait if neither happens. The fallback timer
//! is independent of the state machine's own profile timeout.

use crate::observer::{TracingObserver, Transition, TransitionObserver};
use crate::ports::{Navigator, NotificationSink};
use crate::types::{NavigateOptions, Notification, NotificationVariant, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    pub landing_path: String,
    /// Give up waiting for the profile after this long.
    pub fallback: Duration,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            landing_path: "/dashboard".to_string(),
            fallback: Duration::from_secs(8),
        }
    }
}

/// Per-identity redirect bookkeeping. Reset whenever the identity changes.
#[derive(Debug, Default)]
struct RedirectState {
    user_id: Option<String>,
    attempted: bool,
    notified: bool,
    fallback_at: Option<Instant>,
}

impl RedirectState {
    fn reset(&mut self, user_id: Option<String>) {
        *self = Self {
            user_id,
            ..Self::default()
        };
    }
}

pub struct RedirectCoordinator {
    config: RedirectConfig,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn NotificationSink>,
    observer: Arc<dyn TransitionObserver>,
}

impl RedirectCoordinator {
    pub fn new(
        config: RedirectConfig,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            navigator,
            notifier,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start reacting to `sessions`. Dropping the handle stops it.
    pub fn spawn(self, sessions: watch::Receiver<Session>) -> RedirectHandle {
        RedirectHandle {
            task: tokio::spawn(self.run(sessions)),
        }
    }

    async fn run(self, mut sessions: watch::Receiver<Session>) {
        let mut state = RedirectState::default();
        loop {
            let snapshot = sessions.borrow_and_update().clone();
            self.evaluate(&mut state, &snapshot);

            let fallback_at = state.fallback_at;
            tokio::select! {
                changed = sessions.changed() => {
                    if changed.is_err() {
                        debug!("Session store closed, redirect coordinator stopping");
                        return;
                    }
                }
                _ = sleep_until(fallback_at.unwrap_or_else(Instant::now)), if fallback_at.is_some() => {
                    state.fallback_at = None;
                    if !state.attempted && !self.on_landing(&mut state) {
                        self.redirect(
                            &mut state,
                            true,
                            Some(
                                "Your profile is taking longer than expected to load. \
                                 Some features may be unavailable."
                                    .to_string(),
                            ),
                        );
                    }
                }
            }
        }
    }

    fn evaluate(&self, state: &mut RedirectState, session: &Session) {
        let user_id = session.user_id().map(str::to_string);
        if user_id != state.user_id {
            state.reset(user_id);
        }
        if state.user_id.is_none() || state.attempted || self.on_landing(state) {
            return;
        }

        if session.profile.is_some() {
            self.redirect(state, false, None);
        } else if session.profile_failed() {
            self.redirect(state, false, session.profile_error.clone());
        } else if state.fallback_at.is_none() {
            debug!(
                fallback_ms = self.config.fallback.as_millis() as u64,
                "Waiting for profile before redirecting"
            );
            state.fallback_at = Some(Instant::now() + self.config.fallback);
        }
    }

    /// Already on the landing route counts as a completed redirect.
    fn on_landing(&self, state: &mut RedirectState) -> bool {
        if self.navigator.current_path() != self.config.landing_path {
            return false;
        }
        state.attempted = true;
        state.fallback_at = None;
        true
    }

    fn redirect(&self, state: &mut RedirectState, fallback: bool, missing_profile: Option<String>) {
        state.attempted = true;
        state.fallback_at = None;

        if let Some(description) = missing_profile {
            if !state.notified {
                state.notified = true;
                self.notifier.notify(Notification::new(
                    "Continuing without profile",
                    description,
                    NotificationVariant::Warning,
                ));
            }
        }

        self.observer.on_transition(&Transition::RedirectIssued {
            path: self.config.landing_path.clone(),
            fallback,
        });
        self.navigator
            .go_to(&self.config.landing_path, NavigateOptions { replace: true });
    }
}

pub struct RedirectHandle {
    task: JoinHandle<()>,
}

impl RedirectHandle {
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for RedirectHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
