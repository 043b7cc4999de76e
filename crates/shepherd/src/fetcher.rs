//! Profile fetching with a bounded retry budget.
//!
//! Three failure classes are handled differently:
//!
//! | Store error          | Behaviour                                              |
//! |----------------------|--------------------------------------------------------|
//! | `NotFound`           | wait `not_found_grace` once, retry once, then `StillMissing` |
//! | `PermissionDenied`   | terminal immediately                                   |
//! | `Unavailable`        | retry after `delay`, up to `max_attempts` in total     |
//!
//! The not-found grace retry does not count against `max_attempts`.

use crate::error::{ProfileError, ProfileResult, ProfileStoreError};
use crate::observer::{Transition, TransitionObserver};
use crate::ports::ProfileStore;
use crate::types::Profile;
use std::sync::Arc;
use std::time::Duration;

/// Retry behaviour for profile fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for transient failures (initial attempt included).
    pub max_attempts: u32,
    /// Delay between transient retries. Fixed, not exponential.
    pub delay: Duration,
    /// Wait before the single retry of a missing row.
    pub not_found_grace: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            not_found_grace: Duration::from_secs(2),
        }
    }
}

/// Resolves profiles for identities.
#[derive(Clone)]
pub struct ProfileFetcher {
    store: Arc<dyn ProfileStore>,
    policy: RetryPolicy,
    observer: Arc<dyn TransitionObserver>,
}

impl ProfileFetcher {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        policy: RetryPolicy,
        observer: Arc<dyn TransitionObserver>,
    ) -> Self {
        Self {
            store,
            policy,
            observer,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the profile for `identity_id`, retrying per the policy.
    pub async fn fetch(&self, identity_id: &str) -> ProfileResult<Profile> {
        self.fetch_with(identity_id, |_| {}).await
    }

    /// Like [`fetch`](Self::fetch), calling `on_retry(attempt)` before each
    /// transient retry so callers can publish the retry count.
    pub async fn fetch_with(
        &self,
        identity_id: &str,
        mut on_retry: impl FnMut(u32) + Send,
    ) -> ProfileResult<Profile> {
        let mut attempt = 0;
        let mut grace_used = false;

        loop {
            let err = match self.store.get_by_identity_id(identity_id).await {
                Ok(profile) => return Ok(profile),
                Err(ProfileStoreError::NotFound) if grace_used => {
                    return Err(ProfileError::StillMissing)
                }
                Err(ProfileStoreError::NotFound) => {
                    grace_used = true;
                    self.observer.on_transition(&Transition::ProfileGraceWait {
                        user_id: identity_id.to_string(),
                        delay: self.policy.not_found_grace,
                    });
                    tokio::time::sleep(self.policy.not_found_grace).await;
                    continue;
                }
                Err(err) => ProfileError::from(err),
            };

            if !err.is_retryable() {
                return Err(err);
            }

            attempt += 1;
            if attempt >= self.policy.max_attempts {
                return Err(ProfileError::Exhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }

            let delay = self.policy.delay;
            self.observer.on_transition(&Transition::ProfileFetchRetry {
                user_id: identity_id.to_string(),
                attempt,
                delay,
            });
            on_retry(attempt);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::tests::harness::{assert_elapsed, profile, ScriptedProfileStore, StoreStep};
    use tokio::time::Instant;

    fn fetcher(store: Arc<ScriptedProfileStore>) -> (ProfileFetcher, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        (
            ProfileFetcher::new(store, RetryPolicy::default(), observer.clone()),
            observer,
        )
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
        assert_eq!(policy.not_found_grace, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let store = Arc::new(ScriptedProfileStore::new([StoreStep::Found(profile("u1"))]));
        let (fetcher, observer) = fetcher(store.clone());

        let result = fetcher.fetch("u1").await.unwrap();

        assert_eq!(result.id, "u1");
        assert_eq!(store.calls(), 1);
        assert_eq!(observer.transitions().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_then_found_uses_grace_not_budget() {
        let store = Arc::new(ScriptedProfileStore::new([
            StoreStep::NotFound,
            StoreStep::Found(profile("u1")),
        ]));
        let (fetcher, observer) = fetcher(store.clone());
        let start = Instant::now();

        let result = fetcher.fetch("u1").await.unwrap();

        assert_eq!(result.id, "u1");
        assert_elapsed(start, Duration::from_secs(2));
        assert_eq!(
            observer.count(|t| matches!(t, Transition::ProfileGraceWait { .. })),
            1
        );
        assert_eq!(
            observer.count(|t| matches!(t, Transition::ProfileFetchRetry { .. })),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_twice_is_still_missing() {
        let store = Arc::new(ScriptedProfileStore::new([
            StoreStep::NotFound,
            StoreStep::NotFound,
        ]));
        let (fetcher, _) = fetcher(store.clone());

        let err = fetcher.fetch("u1").await.unwrap_err();

        assert_eq!(err, ProfileError::StillMissing);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_retry_happens_once_per_fetch() {
        let store = Arc::new(ScriptedProfileStore::new([
            StoreStep::NotFound,
            StoreStep::Unavailable("blip".to_string()),
            StoreStep::NotFound,
        ]));
        let (fetcher, _) = fetcher(store.clone());

        let err = fetcher.fetch("u1").await.unwrap_err();

        assert_eq!(err, ProfileError::StillMissing);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_budget() {
        let store = Arc::new(ScriptedProfileStore::new([
            StoreStep::Unavailable("first".to_string()),
            StoreStep::Unavailable("second".to_string()),
            StoreStep::Unavailable("third".to_string()),
            StoreStep::Found(profile("u1")),
        ]));
        let (fetcher, _) = fetcher(store.clone());
        let mut retries = Vec::new();
        let start = Instant::now();

        let err = fetcher
            .fetch_with("u1", |attempt| retries.push(attempt))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProfileError::Exhausted {
                attempts: 3,
                last: "third".to_string()
            }
        );
        assert_eq!(store.calls(), 3);
        assert_eq!(retries, vec![1, 2]);
        assert_elapsed(start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let store = Arc::new(ScriptedProfileStore::new([
            StoreStep::Unavailable("blip".to_string()),
            StoreStep::Found(profile("u1")),
        ]));
        let (fetcher, observer) = fetcher(store.clone());

        assert!(fetcher.fetch("u1").await.is_ok());
        assert_eq!(
            observer.count(|t| matches!(t, Transition::ProfileFetchRetry { attempt: 1, .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_immediate() {
        let store = Arc::new(ScriptedProfileStore::new([
            StoreStep::PermissionDenied("row level security".to_string()),
            StoreStep::Found(profile("u1")),
        ]));
        let (fetcher, _) = fetcher(store.clone());
        let start = Instant::now();

        let err = fetcher.fetch("u1").await.unwrap_err();

        assert!(matches!(err, ProfileError::PermissionDenied(_)));
        assert_eq!(store.calls(), 1);
        assert_elapsed(start, Duration::ZERO);
    }
}
