//! Session runtime driven by identity-provider events.
//!
//! [`AuthStateMachine`] subscribes to the provider, synthesizes an
//! `InitialSession` event from whatever session the provider already holds,
//! and then processes every event in order. Each identity-bearing event
//! starts a profile fetch tagged with the store epoch; a newer event makes
//! older fetches stale, so their results are dropped instead of written.
//!
//! Store mutations and FSM transitions happen together under the FSM lock.
//! Tasks are only aborted after that lock is released and the store update
//! is visible, so an aborted fetch can only ever settle a stale epoch.

use crate::auth_fsm::{AuthState, SessionMachine, SessionMachineInput};
use crate::error::{ProfileError, ProfileResult, SessionError, SessionResult};
use crate::fetcher::{ProfileFetcher, RetryPolicy};
use crate::observer::{TracingObserver, Transition, TransitionObserver};
use crate::ports::{AuthEventStream, IdentityProvider, ProfileStore};
use crate::store::SessionStore;
use crate::types::{AuthEvent, AuthEventKind, Profile, Session};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timing knobs for the session runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Upper bound for one profile load, retries included.
    pub profile_timeout: Duration,
    /// Retry behaviour inside that bound.
    pub retry: RetryPolicy,
    /// Upper bound for the remote half of sign-out.
    pub sign_out_timeout: Duration,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            profile_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            sign_out_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for the session runtime. Consumed by [`start`](Self::start), so a
/// runtime can only be started once.
pub struct AuthStateMachine {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    store: SessionStore,
    config: MachineConfig,
    observer: Arc<dyn TransitionObserver>,
}

impl AuthStateMachine {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        store: SessionStore,
    ) -> Self {
        Self {
            provider,
            profiles,
            store,
            config: MachineConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Subscribe to the provider and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SessionHandle {
        // Subscribe before reading the current session so nothing emitted in
        // between is lost.
        let events = self.provider.subscribe();
        let fetcher = ProfileFetcher::new(
            self.profiles,
            self.config.retry.clone(),
            Arc::clone(&self.observer),
        );

        let inner = Arc::new(Inner {
            store: self.store,
            provider: self.provider,
            fetcher,
            config: self.config,
            observer: self.observer,
            fsm: Mutex::new(SessionMachine::new()),
            in_flight: Mutex::new(None),
            event_loop: Mutex::new(None),
            live: AtomicBool::new(true),
        });

        let task = tokio::spawn(Arc::clone(&inner).run(events));
        *inner.event_loop.lock() = Some(task);
        info!("Session runtime started");

        SessionHandle { inner }
    }
}

/// Cheap, cloneable handle to a running session runtime.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> Session {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.store.subscribe()
    }

    /// Current FSM state.
    pub fn state(&self) -> AuthState {
        AuthState::from(self.inner.fsm.lock().state())
    }

    /// False once [`shutdown`](Self::shutdown) has run.
    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    /// Re-fetch the profile for the identity already held.
    ///
    /// The current profile stays visible until the new fetch settles.
    pub fn refresh_profile(&self) -> SessionResult<()> {
        if !self.is_live() {
            return Err(SessionError::Closed);
        }

        let inner = &self.inner;
        let previous = inner
            .commit(SessionMachineInput::RefreshRequested, || {
                let (epoch, identity) = inner.store.begin_refresh()?;
                info!(user_id = %identity.user_id, "Refreshing profile");
                Some(inner.spawn_load(epoch, identity.user_id, inner.load_deadline()))
            })
            .ok_or(SessionError::NotSignedIn)?;

        if let Some(task) = previous {
            task.abort();
        }
        Ok(())
    }

    /// Sign out with the provider, then clear local state.
    ///
    /// Local state is cleared even when the provider call fails or hangs;
    /// the failure is reported through the observer and otherwise swallowed.
    pub async fn sign_out(&self) {
        let inner = &self.inner;
        if !inner.is_live() {
            debug!("Sign-out ignored, session runtime is shut down");
            return;
        }

        let timeout = inner.config.sign_out_timeout;
        match tokio::time::timeout(timeout, inner.provider.sign_out()).await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                inner
                    .observer
                    .on_transition(&Transition::SignOutFailed { message });
            }
            Err(_) => {
                inner.observer.on_transition(&Transition::SignOutFailed {
                    message: format!("Sign-out timed out after {}s", timeout.as_secs()),
                });
            }
        }

        let cleared = inner.commit(SessionMachineInput::SignOutRequested, || {
            inner.store.clear();
            Some(())
        });
        inner.cancel_in_flight();
        if cleared.is_some() {
            inner.observer.on_transition(&Transition::SignedOut);
        }
    }

    /// Stop processing events and invalidate outstanding fetches.
    ///
    /// Visible state is left as-is; nothing is written after this returns.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        {
            let _fsm = inner.fsm.lock();
            if !inner.live.swap(false, Ordering::SeqCst) {
                return;
            }
            inner.store.retire();
        }

        if let Some(task) = inner.event_loop.lock().take() {
            task.abort();
        }
        inner.cancel_in_flight();
        info!("Session runtime shut down");
    }
}

struct Inner {
    store: SessionStore,
    provider: Arc<dyn IdentityProvider>,
    fetcher: ProfileFetcher,
    config: MachineConfig,
    observer: Arc<dyn TransitionObserver>,
    fsm: Mutex<SessionMachine>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    live: AtomicBool,
}

impl Inner {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Deadline for a load starting now.
    fn load_deadline(&self) -> Instant {
        Instant::now() + self.config.profile_timeout
    }

    async fn run(self: Arc<Self>, mut events: AuthEventStream) {
        // The session read and the first profile load share one budget.
        let startup_deadline = self.load_deadline();
        let initial = match tokio::time::timeout_at(
            startup_deadline,
            self.provider.current_session(),
        )
        .await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(message)) => {
                warn!(error = %message, "Could not read current session, treating as signed out");
                None
            }
            Err(_) => {
                warn!("Timed out reading current session, treating as signed out");
                None
            }
        };
        self.apply(
            AuthEvent::new(AuthEventKind::InitialSession, initial),
            startup_deadline,
        );

        while let Some(event) = events.recv().await {
            if !self.is_live() {
                break;
            }
            self.apply(event, self.load_deadline());
        }
        debug!("Identity event stream closed");
    }

    fn apply(self: &Arc<Self>, event: AuthEvent, deadline: Instant) {
        if !self.is_live() {
            return;
        }
        self.observer.on_transition(&Transition::EventReceived {
            kind: event.kind,
            has_identity: event.identity.is_some(),
        });

        match event.identity {
            Some(identity) => {
                let previous = self
                    .commit(SessionMachineInput::IdentityPresent, || {
                        let user_id = identity.user_id.clone();
                        let epoch = self.store.begin_loading(identity);
                        Some(self.spawn_load(epoch, user_id, deadline))
                    })
                    .flatten();
                if let Some(task) = previous {
                    task.abort();
                }
            }
            None => {
                self.commit(SessionMachineInput::IdentityAbsent, || {
                    self.store.clear();
                    Some(())
                });
                self.cancel_in_flight();
            }
        }
    }

    /// Run `mutate` and, if it produced a value, apply `input` to the FSM,
    /// both under the FSM lock. Does nothing once shut down.
    fn commit<R>(
        &self,
        input: SessionMachineInput,
        mutate: impl FnOnce() -> Option<R>,
    ) -> Option<R> {
        let mut fsm = self.fsm.lock();
        if !self.is_live() {
            return None;
        }
        let value = mutate()?;

        let old_state = AuthState::from(fsm.state());
        let stepped = fsm.consume(&input);
        let current = fsm.state().clone();
        drop(fsm);

        let new_state = AuthState::from(&current);
        match stepped {
            Ok(_) if new_state != old_state => {
                self.observer.on_transition(&Transition::StateChanged {
                    from: old_state,
                    to: new_state,
                });
            }
            Ok(_) => {}
            Err(_) => {
                let err = SessionError::InvalidStateTransition(format!(
                    "Cannot apply {:?} in state {:?}",
                    input, current
                ));
                warn!(error = %err, "Session FSM rejected input");
            }
        }
        Some(value)
    }

    /// Spawn the fetch for `epoch`, returning the task it supersedes.
    fn spawn_load(
        self: &Arc<Self>,
        epoch: u64,
        user_id: String,
        deadline: Instant,
    ) -> Option<JoinHandle<()>> {
        let inner = Arc::clone(self);
        let task =
            tokio::spawn(async move { inner.load_profile(epoch, user_id, deadline).await });
        self.in_flight.lock().replace(task)
    }

    fn cancel_in_flight(&self) {
        if let Some(task) = self.in_flight.lock().take() {
            task.abort();
        }
    }

    async fn load_profile(self: Arc<Self>, epoch: u64, user_id: String, deadline: Instant) {
        let mut guard = LoadingGuard {
            inner: Some(Arc::clone(&self)),
            epoch,
            user_id: user_id.clone(),
        };
        self.observer.on_transition(&Transition::ProfileFetchStarted {
            user_id: user_id.clone(),
        });

        let store = self.store.clone();
        let fetch = self.fetcher.fetch_with(&user_id, move |attempt| {
            store.set_retry_count(epoch, attempt);
        });
        let outcome = match tokio::time::timeout_at(deadline, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ProfileError::Timeout(self.config.profile_timeout)),
        };

        guard.disarm();
        self.finish(epoch, user_id, outcome);
    }

    /// Publish a fetch outcome if `epoch` is still current.
    fn finish(&self, epoch: u64, user_id: String, outcome: ProfileResult<Profile>) {
        let (input, settled, report) = match outcome {
            Ok(profile) => (
                SessionMachineInput::ProfileLoaded,
                Ok(profile),
                Transition::ProfileLoaded {
                    user_id: user_id.clone(),
                },
            ),
            Err(err) => (
                SessionMachineInput::ProfileFailed,
                Err(err.to_string()),
                Transition::ProfileFailed {
                    user_id: user_id.clone(),
                    message: err.to_string(),
                },
            ),
        };

        let applied = self.commit(input, || self.store.settle(epoch, settled).then_some(()));
        match applied {
            Some(()) => self.observer.on_transition(&report),
            None => self
                .observer
                .on_transition(&Transition::StaleResultDiscarded { user_id }),
        }
    }
}

/// Settles a fetch that never reached its own `finish` (aborted or
/// panicked), so `loading` cannot stay stuck for a current epoch.
struct LoadingGuard {
    inner: Option<Arc<Inner>>,
    epoch: u64,
    user_id: String,
}

impl LoadingGuard {
    fn disarm(&mut self) {
        self.inner = None;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.finish(
                self.epoch,
                std::mem::take(&mut self.user_id),
                Err(ProfileError::Interrupted),
            );
        }
    }
}
