//! Session and profile error types.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`crate::ProfileStore`] for a single lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileStoreError {
    /// No row exists yet for this identity.
    #[error("Profile not found")]
    NotFound,

    /// The store refused access to the row.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Network blip, store outage, malformed response.
    #[error("{0}")]
    Unavailable(String),
}

/// Terminal outcome of a profile fetch, after retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// Row missing on a single attempt (consumed by the grace retry).
    #[error("Profile not found")]
    NotFound,

    /// Row still missing after the provisioning grace period.
    #[error("Profile not found. Your account may still be being set up; please try again shortly.")]
    StillMissing,

    /// Access-control refusal; retrying cannot change it.
    #[error("Permission denied loading profile: {0}")]
    PermissionDenied(String),

    /// Transient store failure.
    #[error("{0}")]
    Unavailable(String),

    /// Retry budget spent. Carries the last failure's message.
    #[error("{last}")]
    Exhausted { attempts: u32, last: String },

    /// The load was cancelled before it could settle.
    #[error("Profile loading was interrupted")]
    Interrupted,

    /// The whole load, retries included, exceeded its deadline.
    #[error("Profile loading timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl ProfileError {
    /// Returns true if the fetcher's retry loop should try again.
    ///
    /// Only transient store failures qualify. Not-found has its own single
    /// grace retry, and permission-denied is an access decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProfileError::Unavailable(_))
    }
}

impl From<ProfileStoreError> for ProfileError {
    fn from(err: ProfileStoreError) -> Self {
        match err {
            ProfileStoreError::NotFound => ProfileError::NotFound,
            ProfileStoreError::PermissionDenied(msg) => ProfileError::PermissionDenied(msg),
            ProfileStoreError::Unavailable(msg) => ProfileError::Unavailable(msg),
        }
    }
}

/// Result type alias using ProfileError.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Error type for session runtime operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Operation needs an identity and there is none.
    #[error("Not signed in")]
    NotSignedIn,

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// The runtime has been shut down.
    #[error("Session runtime is shut down")]
    Closed,
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
