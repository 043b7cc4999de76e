//! Idle sign-out with an advance warning.
//!
//! While an identity is present the monitor listens to every tracked input
//! kind and keeps two deadlines: a warning at `timeout - warning` and expiry
//! at `timeout`. Any input restarts the idle period. Hiding the surface
//! pauses the clock; showing it again resumes with the idle time already
//! spent. Expiry signs out and is terminal until the next sign-in.

use crate::activity::{ActivityListener, ActivitySignal, ActivitySource, InputKind, Visibility};
use crate::machine::SessionHandle;
use crate::observer::{TracingObserver, Transition, TransitionObserver};
use crate::ports::NotificationSink;
use crate::types::{Notification, NotificationVariant, Session};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactivityConfig {
    /// Idle time before sign-out.
    pub timeout: Duration,
    /// How long before sign-out the warning appears.
    pub warning: Duration,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            warning: Duration::from_secs(30),
        }
    }
}

impl InactivityConfig {
    /// Idle time before the warning.
    pub fn warning_after(&self) -> Duration {
        self.timeout.saturating_sub(self.warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdlePhase {
    /// No identity; nothing is tracked.
    Detached,
    Active,
    Warned,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleStatus {
    pub phase: IdlePhase,
    pub paused: bool,
}

impl IdleStatus {
    fn detached() -> Self {
        Self {
            phase: IdlePhase::Detached,
            paused: false,
        }
    }
}

/// One idle period. Pure bookkeeping; the monitor owns the sleeping.
#[derive(Debug)]
struct IdleClock {
    config: InactivityConfig,
    started: Instant,
    /// Idle time spent before the surface was hidden. `Some` while paused.
    paused_at: Option<Duration>,
    warned: bool,
    timed_out: bool,
}

impl IdleClock {
    fn new(config: InactivityConfig, now: Instant, visibility: Visibility) -> Self {
        Self {
            config,
            started: now,
            paused_at: (visibility == Visibility::Hidden).then_some(Duration::ZERO),
            warned: false,
            timed_out: false,
        }
    }

    fn warning_at(&self) -> Option<Instant> {
        if self.paused_at.is_some() || self.warned || self.timed_out {
            return None;
        }
        Some(self.started + self.config.warning_after())
    }

    fn expiry_at(&self) -> Option<Instant> {
        if self.paused_at.is_some() || self.timed_out {
            return None;
        }
        Some(self.started + self.config.timeout)
    }

    fn touch(&mut self, now: Instant) {
        if self.timed_out {
            return;
        }
        self.started = now;
        self.warned = false;
        if self.paused_at.is_some() {
            self.paused_at = Some(Duration::ZERO);
        }
    }

    fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() && !self.timed_out {
            self.paused_at = Some(now.saturating_duration_since(self.started));
        }
    }

    fn resume(&mut self, now: Instant) {
        if let Some(spent) = self.paused_at.take() {
            self.started = now.checked_sub(spent).unwrap_or(now);
        }
    }

    fn status(&self) -> IdleStatus {
        let phase = if self.timed_out {
            IdlePhase::TimedOut
        } else if self.warned {
            IdlePhase::Warned
        } else {
            IdlePhase::Active
        };
        IdleStatus {
            phase,
            paused: self.paused_at.is_some(),
        }
    }
}

enum Exit {
    SignedOut,
    Closed,
}

pub struct InactivityMonitor {
    config: InactivityConfig,
    source: Arc<dyn ActivitySource>,
    notifier: Arc<dyn NotificationSink>,
    observer: Arc<dyn TransitionObserver>,
}

impl InactivityMonitor {
    pub fn new(
        config: InactivityConfig,
        source: Arc<dyn ActivitySource>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            source,
            notifier,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start monitoring `session`. Dropping the handle stops the monitor.
    pub fn spawn(self, session: SessionHandle) -> InactivityHandle {
        let (status_tx, status_rx) = watch::channel(IdleStatus::detached());
        let task = tokio::spawn(self.run(session, status_tx));
        InactivityHandle {
            task,
            status: status_rx,
        }
    }

    async fn run(self, session: SessionHandle, status: watch::Sender<IdleStatus>) {
        let mut sessions = session.subscribe();
        loop {
            if sessions.wait_for(Session::is_authenticated).await.is_err() {
                return;
            }
            match self.track(&session, &mut sessions, &status).await {
                Exit::SignedOut => {
                    status.send_replace(IdleStatus::detached());
                }
                Exit::Closed => return,
            }
        }
    }

    /// Track one signed-in stretch until the identity goes away.
    async fn track(
        &self,
        session: &SessionHandle,
        sessions: &mut watch::Receiver<Session>,
        status: &watch::Sender<IdleStatus>,
    ) -> Exit {
        let mut user_id = sessions.borrow().user_id().map(str::to_string);
        let mut listener = Some(self.source.attach(&InputKind::TRACKED));
        let mut clock = IdleClock::new(
            self.config.clone(),
            Instant::now(),
            self.source.visibility(),
        );
        debug!(user_id = ?user_id, "Inactivity monitor attached");

        loop {
            status.send_if_modified(|current| {
                let next = clock.status();
                let changed = *current != next;
                *current = next;
                changed
            });

            let warning_at = clock.warning_at();
            let expiry_at = clock.expiry_at();

            tokio::select! {
                changed = sessions.changed() => {
                    if changed.is_err() {
                        return Exit::Closed;
                    }
                    let current = sessions.borrow_and_update().user_id().map(str::to_string);
                    match current {
                        None => {
                            debug!("Inactivity monitor detached");
                            return Exit::SignedOut;
                        }
                        Some(id) if user_id.as_deref() != Some(id.as_str()) => {
                            clock = IdleClock::new(
                                self.config.clone(),
                                Instant::now(),
                                self.source.visibility(),
                            );
                            user_id = Some(id);
                        }
                        Some(_) => {}
                    }
                }
                signal = next_signal(&mut listener) => match signal {
                    Some(ActivitySignal::Input(_)) => clock.touch(Instant::now()),
                    Some(ActivitySignal::Visibility(Visibility::Hidden)) => {
                        clock.pause(Instant::now())
                    }
                    Some(ActivitySignal::Visibility(Visibility::Visible)) => {
                        clock.resume(Instant::now())
                    }
                    None => {
                        debug!("Activity source closed, idle clock keeps running");
                        listener = None;
                    }
                },
                _ = sleep_until(warning_at.unwrap_or_else(Instant::now)), if warning_at.is_some() => {
                    clock.warned = true;
                    self.observer.on_transition(&Transition::InactivityWarning);
                    self.notifier.notify(Notification::new(
                        "Session Expiring Soon",
                        format!(
                            "You will be signed out in {} seconds due to inactivity.",
                            self.config.warning.as_secs()
                        ),
                        NotificationVariant::Warning,
                    ));
                }
                _ = sleep_until(expiry_at.unwrap_or_else(Instant::now)), if expiry_at.is_some() => {
                    clock.timed_out = true;
                    listener = None;
                    status.send_replace(clock.status());
                    self.observer.on_transition(&Transition::InactivityTimeout);
                    self.notifier.notify(Notification::new(
                        "Session Expired",
                        "You have been signed out due to inactivity.",
                        NotificationVariant::Destructive,
                    ));
                    session.sign_out().await;
                }
            }
        }
    }
}

async fn next_signal(listener: &mut Option<ActivityListener>) -> Option<ActivitySignal> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

/// Running monitor. Dropping it (or calling [`shutdown`](Self::shutdown))
/// stops the task and detaches its listeners.
pub struct InactivityHandle {
    task: JoinHandle<()>,
    status: watch::Receiver<IdleStatus>,
}

impl InactivityHandle {
    pub fn status(&self) -> IdleStatus {
        *self.status.borrow()
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for InactivityHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
