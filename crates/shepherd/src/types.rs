//! Domain types shared by the session runtime and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated principal, as issued by the identity provider.
///
/// The runtime only ever holds a read-only clone; the provider owns the
/// real session (refresh token, persistence).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

// Keep bearer tokens out of logs.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Application role. Used for display and authorization gating elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    MinistryLeader,
    Member,
    Director,
    SuperOrg,
}

impl Role {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::MinistryLeader => "Ministry Leader",
            Role::Member => "Member",
            Role::Director => "Director",
            Role::SuperOrg => "Super Organisation",
        }
    }
}

/// Application-level user record, keyed by identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub ministry_id: Option<String>,
    #[serde(default)]
    pub organisation_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Profile {
    /// "First Last", whichever parts exist, falling back to the email.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

/// In-memory aggregate of identity, profile, and loading/error flags.
///
/// Consumers only ever see immutable snapshots of this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub profile_error: Option<String>,
    pub profile_retry_count: u32,
    #[serde(skip)]
    pub(crate) epoch: u64,
}

impl Default for Session {
    /// A fresh session is loading until the first identity event resolves.
    fn default() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
            profile_error: None,
            profile_retry_count: 0,
            epoch: 0,
        }
    }
}

impl Session {
    /// Counter bumped whenever the identity slot is replaced or cleared.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.user_id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Profile loading has finished unsuccessfully and will not retry on its own.
    pub fn profile_failed(&self) -> bool {
        !self.loading && self.profile.is_none() && self.profile_error.is_some()
    }
}

/// Kind of identity-provider change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One identity-provider notification with its (nullable) session payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub identity: Option<Identity>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, identity: Option<Identity>) -> Self {
        Self { kind, identity }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self::new(AuthEventKind::SignedIn, Some(identity))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }
}

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationVariant {
    Default,
    Warning,
    Destructive,
}

/// Fire-and-forget toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        variant: NotificationVariant,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant,
        }
    }
}

/// Options for [`crate::Navigator::go_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}
