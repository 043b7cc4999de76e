//! The single source of truth for the current session.
//!
//! Backed by a `watch` channel: readers hold cheap receivers and always see
//! a complete snapshot; writers replace fields inside one atomic closure.
//! Mutation is crate-private so only the state machine and the sign-out
//! routine can change it.

use crate::types::{Identity, Profile, Session};
use tokio::sync::watch;

/// Process-wide session store. Clone to share.
#[derive(Clone)]
pub struct SessionStore {
    tx: watch::Sender<Session>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Session::default());
        Self { tx }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Install `identity`, clear error state, and mark loading. The profile
    /// is dropped unless the identity is the same user as before.
    ///
    /// Returns the new epoch. Any fetch tagged with an older epoch is stale.
    pub(crate) fn begin_loading(&self, identity: Identity) -> u64 {
        let mut epoch = 0;
        self.tx.send_modify(|s| {
            s.epoch += 1;
            epoch = s.epoch;
            if s.user_id() != Some(identity.user_id.as_str()) {
                s.profile = None;
            }
            s.identity = Some(identity);
            s.loading = true;
            s.profile_error = None;
            s.profile_retry_count = 0;
        });
        epoch
    }

    /// Re-enter loading for the identity already held. The current profile
    /// stays visible until the new fetch settles.
    ///
    /// Returns the new epoch and identity, or `None` if there is no identity.
    pub(crate) fn begin_refresh(&self) -> Option<(u64, Identity)> {
        let mut result = None;
        self.tx.send_if_modified(|s| match s.identity.clone() {
            Some(identity) => {
                s.epoch += 1;
                s.loading = true;
                s.profile_error = None;
                s.profile_retry_count = 0;
                result = Some((s.epoch, identity));
                true
            }
            None => false,
        });
        result
    }

    /// Record a retry attempt for the fetch tagged `epoch`.
    pub(crate) fn set_retry_count(&self, epoch: u64, attempt: u32) -> bool {
        self.tx.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.profile_retry_count = attempt;
            true
        })
    }

    /// Settle the fetch tagged `epoch`. Returns false (and writes nothing)
    /// if the epoch is stale.
    pub(crate) fn settle(&self, epoch: u64, outcome: Result<Profile, String>) -> bool {
        self.tx.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            match outcome {
                Ok(profile) => {
                    s.profile = Some(profile);
                    s.profile_error = None;
                }
                Err(message) => {
                    s.profile = None;
                    s.profile_error = Some(message);
                }
            }
            s.profile_retry_count = 0;
            s.loading = false;
            true
        })
    }

    /// Drop identity and profile state. Bumps the epoch so in-flight fetches
    /// become stale.
    pub(crate) fn clear(&self) {
        self.tx.send_modify(|s| {
            s.epoch += 1;
            s.identity = None;
            s.profile = None;
            s.profile_error = None;
            s.profile_retry_count = 0;
            s.loading = false;
        });
    }

    /// Invalidate every outstanding fetch without touching visible state.
    pub(crate) fn retire(&self) {
        self.tx.send_if_modified(|s| {
            s.epoch += 1;
            false
        });
    }
}
