//! Grace retry for missing rows, the transient retry budget, and manual refresh.

use super::harness::{
    advance, assert_elapsed, identity, profile, settle, FakeIdentityProvider, Rig, StoreStep,
    NO_STEPS,
};
use crate::auth_fsm::AuthState;
use crate::error::{ProfileError, SessionError};
use std::time::Duration;
use tokio::time::Instant;

fn signed_in(steps: impl IntoIterator<Item = StoreStep>) -> Rig {
    Rig::start(FakeIdentityProvider::with_session(identity("u1")), steps)
}

#[tokio::test(start_paused = true)]
async fn missing_row_then_found_recovers_cleanly() {
    let rig = signed_in([StoreStep::NotFound, StoreStep::Found(profile("u1"))]);
    let start = Instant::now();
    let mut sessions = rig.handle.subscribe();

    sessions
        .wait_for(|s| s.identity.is_some() && !s.loading)
        .await
        .unwrap();

    assert_elapsed(start, Duration::from_secs(2));
    let session = rig.snapshot();
    assert_eq!(session.profile.unwrap().id, "u1");
    assert!(session.profile_error.is_none());
    assert_eq!(session.profile_retry_count, 0);
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedWithProfile);
}

#[tokio::test(start_paused = true)]
async fn row_still_missing_after_grace_is_terminal() {
    let rig = signed_in([StoreStep::NotFound, StoreStep::NotFound]);

    advance(Duration::from_secs(3)).await;

    let session = rig.snapshot();
    assert!(!session.loading);
    assert!(session.profile.is_none());
    assert_eq!(
        session.profile_error,
        Some(ProfileError::StillMissing.to_string())
    );
    assert_eq!(rig.profiles.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn three_transient_failures_exhaust_the_budget() {
    let rig = signed_in([
        StoreStep::Unavailable("first".to_string()),
        StoreStep::Unavailable("second".to_string()),
        StoreStep::Unavailable("third".to_string()),
        StoreStep::Found(profile("u1")),
    ]);

    advance(Duration::from_secs(1)).await;
    let session = rig.snapshot();
    assert!(session.loading);
    assert_eq!(session.profile_retry_count, 1);

    advance(Duration::from_secs(2)).await;
    assert_eq!(rig.snapshot().profile_retry_count, 2);

    advance(Duration::from_secs(2)).await;
    let session = rig.snapshot();
    assert!(!session.loading);
    assert!(session.profile.is_none());
    assert_eq!(session.profile_error.as_deref(), Some("third"));
    assert_eq!(session.profile_retry_count, 0, "retry count must be reset");
    assert_eq!(rig.profiles.calls(), 3);
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedProfileError);
}

#[tokio::test(start_paused = true)]
async fn permission_denied_fails_without_retrying() {
    let rig = signed_in([
        StoreStep::PermissionDenied("row level security".to_string()),
        StoreStep::Found(profile("u1")),
    ]);

    settle().await;

    let session = rig.snapshot();
    assert!(!session.loading);
    assert!(session
        .profile_error
        .as_deref()
        .is_some_and(|e| e.starts_with("Permission denied")));
    assert_eq!(rig.profiles.calls(), 1);
    assert!(session.is_authenticated(), "identity stays usable");
}

#[tokio::test(start_paused = true)]
async fn refresh_after_failure_loads_profile() {
    let rig = signed_in([
        StoreStep::Unavailable("a".to_string()),
        StoreStep::Unavailable("b".to_string()),
        StoreStep::Unavailable("c".to_string()),
        StoreStep::Found(profile("u1")),
    ]);
    advance(Duration::from_secs(5)).await;
    assert!(rig.snapshot().profile_failed());

    rig.handle.refresh_profile().unwrap();
    settle().await;

    let session = rig.snapshot();
    assert_eq!(session.profile.unwrap().id, "u1");
    assert!(session.profile_error.is_none());
    assert_eq!(
        rig.observer.states(),
        vec![
            AuthState::Loading,
            AuthState::AuthenticatedProfileError,
            AuthState::Loading,
            AuthState::AuthenticatedWithProfile,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_keeps_current_profile_visible() {
    let rig = signed_in([
        StoreStep::Found(profile("u1")),
        StoreStep::Delayed(Duration::from_secs(1), profile("u1")),
    ]);
    settle().await;

    rig.handle.refresh_profile().unwrap();
    settle().await;

    let session = rig.snapshot();
    assert!(session.loading);
    assert!(session.profile.is_some());

    advance(Duration::from_secs(1)).await;
    let session = rig.snapshot();
    assert!(!session.loading);
    assert!(session.profile.is_some());
    assert_eq!(rig.profiles.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_without_identity_is_rejected() {
    let rig = Rig::start(FakeIdentityProvider::new(), NO_STEPS);
    settle().await;

    assert!(matches!(
        rig.handle.refresh_profile(),
        Err(SessionError::NotSignedIn)
    ));
    assert_eq!(rig.handle.state(), AuthState::Unauthenticated);
}
