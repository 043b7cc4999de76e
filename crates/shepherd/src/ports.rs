//! Collaborators the session runtime talks to.
//!
//! Everything outside the runtime (identity provider, profile table, toast
//! sink, router) is reached through these traits so hosts and tests can plug
//! in their own.

use crate::error::ProfileStoreError;
use crate::types::{AuthEvent, Identity, NavigateOptions, Notification, Profile};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Ordered stream of identity-provider notifications.
///
/// Dropping the stream unsubscribes.
pub type AuthEventStream = mpsc::UnboundedReceiver<AuthEvent>;

/// Source of authenticated identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to changes that happen after this call, in emission order.
    fn subscribe(&self) -> AuthEventStream;

    /// The identity the provider currently holds, if any.
    async fn current_session(&self) -> Result<Option<Identity>, String>;

    /// End the session with the provider.
    async fn sign_out(&self) -> Result<(), String>;
}

/// Backing store for profile rows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_by_identity_id(&self, identity_id: &str) -> Result<Profile, ProfileStoreError>;
}

/// Fire-and-forget user notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Client-side router.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    fn go_to(&self, path: &str, options: NavigateOptions);
}

/// Subscriber fan-out used by in-process identity providers.
///
/// Closed subscribers are pruned on the next emit.
#[derive(Default)]
pub struct AuthEventBus {
    subscribers: parking_lot::Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
}

impl AuthEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> AuthEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: AuthEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}
