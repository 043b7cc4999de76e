//! Startup, event ordering, stale results, and shutdown.

use super::harness::{
    advance, assert_elapsed, identity, profile, settle, FakeIdentityProvider, Rig, StoreStep,
    NO_STEPS,
};
use crate::auth_fsm::AuthState;
use crate::error::SessionError;
use crate::observer::Transition;
use crate::types::{AuthEvent, AuthEventKind};
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// Startup
// =============================================================================

#[tokio::test(start_paused = true)]
async fn startup_without_session_is_unauthenticated() {
    let rig = Rig::start(FakeIdentityProvider::new(), NO_STEPS);
    assert!(rig.snapshot().loading, "store starts out loading");

    settle().await;

    let session = rig.snapshot();
    assert!(!session.loading);
    assert!(session.identity.is_none());
    assert_eq!(rig.handle.state(), AuthState::Unauthenticated);
    assert_eq!(rig.profiles.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn startup_with_existing_session_loads_profile() {
    let rig = Rig::start(
        FakeIdentityProvider::with_session(identity("u1")),
        [StoreStep::Found(profile("u1"))],
    );

    settle().await;

    let session = rig.snapshot();
    assert!(!session.loading);
    assert_eq!(session.user_id(), Some("u1"));
    assert_eq!(session.profile.unwrap().id, "u1");
    assert_eq!(
        rig.observer.states(),
        vec![AuthState::Loading, AuthState::AuthenticatedWithProfile]
    );
}

#[tokio::test(start_paused = true)]
async fn unreadable_startup_session_counts_as_signed_out() {
    let rig = Rig::start(
        FakeIdentityProvider::with_broken_session("storage corrupted"),
        NO_STEPS,
    );

    settle().await;

    assert!(!rig.snapshot().loading);
    assert_eq!(rig.handle.state(), AuthState::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn sign_in_after_startup_loads_profile() {
    let rig = Rig::start(FakeIdentityProvider::new(), [StoreStep::Found(profile("u1"))]);
    settle().await;

    rig.provider.sign_in(identity("u1"));
    settle().await;

    let session = rig.snapshot();
    assert_eq!(session.profile.unwrap().id, "u1");
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedWithProfile);
    assert_eq!(rig.profiles.requested(), vec!["u1".to_string()]);
}

// =============================================================================
// Loading always settles
// =============================================================================

#[tokio::test(start_paused = true)]
async fn hanging_fetch_settles_at_timeout() {
    let rig = Rig::start(
        FakeIdentityProvider::with_session(identity("u1")),
        [StoreStep::Hang],
    );
    let start = Instant::now();
    let mut sessions = rig.handle.subscribe();

    sessions
        .wait_for(|s| s.identity.is_some() && !s.loading)
        .await
        .unwrap();

    assert_elapsed(start, Duration::from_secs(10));
    let session = rig.snapshot();
    assert!(session.profile.is_none());
    assert_eq!(
        session.profile_error.as_deref(),
        Some("Profile loading timed out after 10s")
    );
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedProfileError);
}

#[tokio::test(start_paused = true)]
async fn slow_session_read_shares_the_startup_timeout() {
    let rig = Rig::start(
        FakeIdentityProvider::with_slow_session(identity("u1"), Duration::from_secs(9)),
        [StoreStep::Hang],
    );
    let start = Instant::now();
    let mut sessions = rig.handle.subscribe();

    sessions
        .wait_for(|s| s.identity.is_some() && !s.loading)
        .await
        .unwrap();

    assert_elapsed(start, Duration::from_secs(10));
    assert_eq!(
        rig.snapshot().profile_error.as_deref(),
        Some("Profile loading timed out after 10s")
    );
}

#[tokio::test(start_paused = true)]
async fn later_loads_get_a_fresh_timeout() {
    let rig = Rig::start(
        FakeIdentityProvider::with_slow_session(identity("u1"), Duration::from_secs(9)),
        [StoreStep::Found(profile("u1")), StoreStep::Hang],
    );
    advance(Duration::from_secs(9)).await;
    assert!(rig.snapshot().profile.is_some());

    rig.provider.sign_in(identity("u2"));
    settle().await;
    let start = Instant::now();
    let mut sessions = rig.handle.subscribe();

    sessions
        .wait_for(|s| s.user_id() == Some("u2") && !s.loading)
        .await
        .unwrap();

    assert_elapsed(start, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn panicking_store_settles_as_interrupted() {
    let rig = Rig::start(
        FakeIdentityProvider::with_session(identity("u1")),
        [StoreStep::Panic],
    );
    settle().await;

    let session = rig.snapshot();
    assert!(!session.loading);
    assert!(session.profile.is_none());
    assert_eq!(
        session.profile_error.as_deref(),
        Some("Profile loading was interrupted")
    );
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedProfileError);
    assert_eq!(
        rig.observer.count(|t| matches!(
            t,
            Transition::ProfileFailed { message, .. } if message == "Profile loading was interrupted"
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn loading_settles_within_timeout_for_every_outcome() {
    let scripts = vec![
        vec![StoreStep::Found(profile("u1"))],
        vec![StoreStep::NotFound, StoreStep::Found(profile("u1"))],
        vec![StoreStep::NotFound, StoreStep::NotFound],
        vec![
            StoreStep::Unavailable("a".to_string()),
            StoreStep::Unavailable("b".to_string()),
            StoreStep::Unavailable("c".to_string()),
        ],
        vec![StoreStep::PermissionDenied("rls".to_string())],
        vec![StoreStep::Hang],
        vec![StoreStep::Delayed(Duration::from_secs(30), profile("u1"))],
        vec![StoreStep::Panic],
    ];

    for script in scripts {
        let description = format!("{script:?}");
        let rig = Rig::start(FakeIdentityProvider::with_session(identity("u1")), script);

        advance(Duration::from_millis(10_100)).await;

        let session = rig.snapshot();
        assert!(!session.loading, "still loading for {description}");
        assert!(
            session.profile.is_some() || session.profile_error.is_some(),
            "no outcome recorded for {description}"
        );
        rig.handle.shutdown();
    }
}

// =============================================================================
// Ordering and stale results
// =============================================================================

#[tokio::test(start_paused = true)]
async fn superseded_fetch_never_writes() {
    let rig = Rig::start(
        FakeIdentityProvider::new(),
        [
            StoreStep::Delayed(Duration::from_secs(5), profile("a")),
            StoreStep::Found(profile("b")),
        ],
    );
    settle().await;

    rig.provider.sign_in(identity("a"));
    settle().await;
    rig.provider.sign_in(identity("b"));
    settle().await;

    assert_eq!(rig.snapshot().profile.unwrap().id, "b");

    advance(Duration::from_secs(6)).await;

    let session = rig.snapshot();
    assert_eq!(session.user_id(), Some("b"));
    assert_eq!(session.profile.unwrap().id, "b");
    assert_eq!(rig.profiles.requested(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        rig.observer.count(
            |t| matches!(t, Transition::StaleResultDiscarded { user_id } if user_id == "a")
        ),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn events_are_processed_in_emission_order() {
    let rig = Rig::start(
        FakeIdentityProvider::new(),
        [
            StoreStep::Found(profile("b")),
            StoreStep::Found(profile("b")),
        ],
    );
    settle().await;

    rig.provider.sign_in(identity("a"));
    rig.provider.emit(AuthEvent::signed_out());
    rig.provider.sign_in(identity("b"));
    settle().await;

    let kinds: Vec<AuthEventKind> = rig
        .observer
        .transitions()
        .into_iter()
        .filter_map(|t| match t {
            Transition::EventReceived { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuthEventKind::InitialSession,
            AuthEventKind::SignedIn,
            AuthEventKind::SignedOut,
            AuthEventKind::SignedIn,
        ]
    );

    let session = rig.snapshot();
    assert_eq!(session.user_id(), Some("b"));
    assert_eq!(session.profile.unwrap().id, "b");
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedWithProfile);
}

#[tokio::test(start_paused = true)]
async fn sign_out_event_during_fetch_discards_result() {
    let rig = Rig::start(
        FakeIdentityProvider::with_session(identity("u1")),
        [StoreStep::Delayed(Duration::from_secs(3), profile("u1"))],
    );
    settle().await;

    rig.provider.emit(AuthEvent::signed_out());
    settle().await;
    advance(Duration::from_secs(5)).await;

    let session = rig.snapshot();
    assert!(session.identity.is_none());
    assert!(session.profile.is_none());
    assert!(!session.loading);
    assert_eq!(rig.handle.state(), AuthState::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn token_refresh_reloads_profile() {
    let rig = Rig::start(
        FakeIdentityProvider::with_session(identity("u1")),
        [
            StoreStep::Found(profile("u1")),
            StoreStep::Found(profile("u1")),
        ],
    );
    settle().await;

    rig.provider.emit(AuthEvent::new(
        AuthEventKind::TokenRefreshed,
        Some(identity("u1")),
    ));
    settle().await;

    assert_eq!(rig.profiles.calls(), 2);
    assert!(rig.snapshot().profile.is_some());
    assert_eq!(rig.handle.state(), AuthState::AuthenticatedWithProfile);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_before_fetch_resolves_freezes_state() {
    let rig = Rig::start(
        FakeIdentityProvider::with_session(identity("u1")),
        [StoreStep::Delayed(Duration::from_secs(2), profile("u1"))],
    );
    settle().await;
    assert!(rig.snapshot().loading);

    rig.handle.shutdown();
    advance(Duration::from_secs(5)).await;

    let session = rig.snapshot();
    assert_eq!(session.user_id(), Some("u1"));
    assert!(session.profile.is_none());
    assert!(session.loading, "nothing may write after shutdown");
    assert!(!rig.handle.is_live());
    assert_eq!(rig.provider.subscriber_count(), 0);

    rig.provider.emit(AuthEvent::signed_out());
    settle().await;
    assert_eq!(rig.snapshot().user_id(), Some("u1"));

    assert!(matches!(
        rig.handle.refresh_profile(),
        Err(SessionError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let rig = Rig::start(FakeIdentityProvider::new(), NO_STEPS);
    settle().await;

    rig.handle.shutdown();
    rig.handle.shutdown();

    assert!(!rig.handle.is_live());
    assert_eq!(rig.handle.state(), AuthState::Unauthenticated);
}
