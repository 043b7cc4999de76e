//! Test harness for the session runtime.
//!
//! Provides:
//! - ScriptedProfileStore: answers lookups from a queue of canned steps
//! - FakeIdentityProvider: in-process provider with a controllable sign-out
//! - RecordingNotifier / RecordingNavigator: capture side effects
//! - Rig: a started runtime wired to the fakes

use crate::error::ProfileStoreError;
use crate::machine::{AuthStateMachine, MachineConfig, SessionHandle};
use crate::observer::RecordingObserver;
use crate::ports::{
    AuthEventBus, AuthEventStream, IdentityProvider, Navigator, NotificationSink, ProfileStore,
};
use crate::store::SessionStore;
use crate::types::{AuthEvent, Identity, NavigateOptions, Notification, Profile, Role, Session};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn profile(id: &str) -> Profile {
    Profile {
        id: id.to_string(),
        email: format!("{id}@church.org"),
        role: Role::Member,
        ministry_id: Some("worship".to_string()),
        organisation_id: None,
        first_name: Some("Test".to_string()),
        last_name: Some(id.to_string()),
    }
}

pub fn identity(id: &str) -> Identity {
    Identity::new(id, format!("token-{id}")).with_email(format!("{id}@church.org"))
}

/// Assert that `expected` has passed since `start` on the (paused) clock.
pub fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    let slack = Duration::from_millis(5);
    assert!(
        elapsed + slack >= expected && elapsed <= expected + slack,
        "expected ~{expected:?} elapsed, got {elapsed:?}"
    );
}

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Sleep on the paused clock, then let woken tasks finish their turn.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

// =============================================================================
// Profile store
// =============================================================================

/// Script for runs that never look up a profile.
pub const NO_STEPS: [StoreStep; 0] = [];

/// One canned answer from [`ScriptedProfileStore`].
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum StoreStep {
    Found(Profile),
    NotFound,
    PermissionDenied(String),
    Unavailable(String),
    /// Never answer.
    Hang,
    /// Answer with the profile after a delay.
    Delayed(Duration, Profile),
    /// Blow up inside the lookup.
    Panic,
}

/// Profile store that replays a script, one step per lookup.
///
/// Lookups past the end of the script fail as unavailable.
pub struct ScriptedProfileStore {
    steps: Mutex<VecDeque<StoreStep>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedProfileStore {
    pub fn new(steps: impl IntoIterator<Item = StoreStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    pub fn push(&self, step: StoreStep) {
        self.steps.lock().push_back(step);
    }
}

#[async_trait]
impl ProfileStore for ScriptedProfileStore {
    async fn get_by_identity_id(&self, identity_id: &str) -> Result<Profile, ProfileStoreError> {
        self.requested.lock().push(identity_id.to_string());
        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| StoreStep::Unavailable("no scripted response".to_string()));

        match step {
            StoreStep::Found(profile) => Ok(profile),
            StoreStep::NotFound => Err(ProfileStoreError::NotFound),
            StoreStep::PermissionDenied(message) => {
                Err(ProfileStoreError::PermissionDenied(message))
            }
            StoreStep::Unavailable(message) => Err(ProfileStoreError::Unavailable(message)),
            StoreStep::Hang => std::future::pending().await,
            StoreStep::Delayed(delay, profile) => {
                tokio::time::sleep(delay).await;
                Ok(profile)
            }
            StoreStep::Panic => panic!("profile store crashed"),
        }
    }
}

// =============================================================================
// Identity provider
// =============================================================================

#[derive(Default)]
pub struct FakeIdentityProvider {
    bus: AuthEventBus,
    current: Mutex<Option<Identity>>,
    current_error: Mutex<Option<String>>,
    current_delay: Mutex<Duration>,
    sign_out_error: Mutex<Option<String>>,
    sign_out_hangs: AtomicBool,
    sign_out_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeIdentityProvider {
    /// Provider with no stored session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already holds `identity` at startup.
    pub fn with_session(identity: Identity) -> Self {
        let provider = Self::default();
        *provider.current.lock() = Some(identity);
        provider
    }

    /// Provider that holds `identity` but takes `delay` to report it.
    pub fn with_slow_session(identity: Identity, delay: Duration) -> Self {
        let provider = Self::with_session(identity);
        *provider.current_delay.lock() = delay;
        provider
    }

    /// Provider whose startup session read fails.
    pub fn with_broken_session(message: &str) -> Self {
        let provider = Self::default();
        *provider.current_error.lock() = Some(message.to_string());
        provider
    }

    pub fn emit(&self, event: AuthEvent) {
        *self.current.lock() = event.identity.clone();
        self.bus.emit(event);
    }

    pub fn sign_in(&self, identity: Identity) {
        self.emit(AuthEvent::signed_in(identity));
    }

    pub fn fail_sign_out(&self, message: &str) {
        *self.sign_out_error.lock() = Some(message.to_string());
    }

    pub fn hang_sign_out(&self) {
        self.sign_out_hangs.store(true, Ordering::SeqCst);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn subscribe(&self) -> AuthEventStream {
        self.bus.subscribe()
    }

    async fn current_session(&self) -> Result<Option<Identity>, String> {
        let delay = *self.current_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.current_error.lock().clone() {
            return Err(message);
        }
        Ok(self.current.lock().clone())
    }

    async fn sign_out(&self) -> Result<(), String> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.sign_out_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failure = self.sign_out_error.lock().clone();
        if let Some(message) = failure {
            return Err(message);
        }
        self.emit(AuthEvent::signed_out());
        Ok(())
    }
}

// =============================================================================
// Notifications and navigation
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn count(&self, title: &str) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.title == title)
            .count()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

/// Router stand-in. Records navigations; the current path only changes when
/// a test sets it.
pub struct RecordingNavigator {
    path: Mutex<String>,
    navigations: Mutex<Vec<(String, NavigateOptions)>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_string()),
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn set_path(&self, path: &str) {
        *self.path.lock() = path.to_string();
    }

    pub fn navigations(&self) -> Vec<(String, NavigateOptions)> {
        self.navigations.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.path.lock().clone()
    }

    fn go_to(&self, path: &str, options: NavigateOptions) {
        self.navigations.lock().push((path.to_string(), options));
    }
}

// =============================================================================
// Rig
// =============================================================================

/// A started runtime wired to the fakes.
pub struct Rig {
    pub provider: Arc<FakeIdentityProvider>,
    pub profiles: Arc<ScriptedProfileStore>,
    pub observer: Arc<RecordingObserver>,
    pub handle: SessionHandle,
}

impl Rig {
    pub fn start(
        provider: FakeIdentityProvider,
        steps: impl IntoIterator<Item = StoreStep>,
    ) -> Self {
        Self::start_with(provider, steps, MachineConfig::default())
    }

    pub fn start_with(
        provider: FakeIdentityProvider,
        steps: impl IntoIterator<Item = StoreStep>,
        config: MachineConfig,
    ) -> Self {
        let provider = Arc::new(provider);
        let profiles = Arc::new(ScriptedProfileStore::new(steps));
        let observer = Arc::new(RecordingObserver::new());

        let handle = AuthStateMachine::new(provider.clone(), profiles.clone(), SessionStore::new())
            .with_config(config)
            .with_observer(observer.clone())
            .start();

        Self {
            provider,
            profiles,
            observer,
            handle,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.handle.snapshot()
    }
}
