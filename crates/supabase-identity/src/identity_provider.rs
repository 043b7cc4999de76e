//! Supabase Auth as an [`IdentityProvider`].
//!
//! The provider owns the session (access and refresh tokens) in memory and
//! broadcasts every change through an [`AuthEventBus`].

use crate::client::{check, SupabaseClient};
use crate::error::{SupabaseError, SupabaseResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use shepherd::{AuthEvent, AuthEventBus, AuthEventKind, AuthEventStream, Identity, IdentityProvider};
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Supabase token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> StoredSession {
        let identity = Identity {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            expires_at: Some(Utc::now() + Duration::seconds(self.expires_in)),
        };
        StoredSession {
            identity,
            refresh_token: self.refresh_token,
        }
    }
}

struct StoredSession {
    identity: Identity,
    refresh_token: String,
}

pub struct SupabaseIdentityProvider {
    client: SupabaseClient,
    bus: AuthEventBus,
    session: Mutex<Option<StoredSession>>,
}

impl SupabaseIdentityProvider {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client,
            bus: AuthEventBus::new(),
            session: Mutex::new(None),
        }
    }

    /// The identity currently held, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.session.lock().as_ref().map(|s| s.identity.clone())
    }

    /// Time left before the held token should be refreshed, `margin` ahead
    /// of its expiry. `None` without a session or without an expiry.
    pub fn refresh_due_in(&self, margin: StdDuration) -> Option<StdDuration> {
        let expires_at = self.session.lock().as_ref()?.identity.expires_at?;
        Some(refresh_delay(expires_at, Utc::now(), margin))
    }

    /// Bearer token for data requests.
    pub fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.identity.access_token.clone())
    }

    /// Sign in with email and password. Emits `SignedIn` on success.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> SupabaseResult<Identity> {
        let mut url = self.client.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        debug!(url = %url, email = %email, "Attempting email/password sign-in");

        let response = self
            .client
            .request(Method::POST, url, None)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let data: TokenResponse = check(response, "sign_in").await?.json().await?;

        let identity = self.install(data.into_session());
        info!(user_id = %identity.user_id, "Sign-in successful");
        self.bus.emit(AuthEvent::signed_in(identity.clone()));
        Ok(identity)
    }

    /// Exchange the refresh token for a new access token. Emits
    /// `TokenRefreshed` on success.
    pub async fn refresh_session(&self) -> SupabaseResult<Identity> {
        let refresh_token = self
            .session
            .lock()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(SupabaseError::NotSignedIn)?;

        let mut url = self.client.auth_url("token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        debug!(url = %url, "Refreshing token");

        let response = self
            .client
            .request(Method::POST, url, None)
            .json(&RefreshGrant {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let data: TokenResponse = check(response, "refresh").await?.json().await?;

        let identity = self.install(data.into_session());
        info!(user_id = %identity.user_id, "Token refreshed successfully");
        self.bus.emit(AuthEvent::new(
            AuthEventKind::TokenRefreshed,
            Some(identity.clone()),
        ));
        Ok(identity)
    }

    fn install(&self, session: StoredSession) -> Identity {
        let identity = session.identity.clone();
        *self.session.lock() = Some(session);
        identity
    }

    async fn logout_remote(&self, access_token: &str) -> SupabaseResult<()> {
        let url = self.client.auth_url("logout")?;
        let response = self
            .client
            .request(Method::POST, url, Some(access_token))
            .send()
            .await?;
        check(response, "sign_out").await?;
        Ok(())
    }
}

/// Zero once `now` is already inside the margin.
fn refresh_delay(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    margin: StdDuration,
) -> StdDuration {
    let margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::zero());
    (expires_at - margin - now).to_std().unwrap_or_default()
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    fn subscribe(&self) -> AuthEventStream {
        self.bus.subscribe()
    }

    async fn current_session(&self) -> Result<Option<Identity>, String> {
        Ok(self.identity())
    }

    /// Revoke the session remotely. The local session is dropped and
    /// `SignedOut` emitted whether or not the remote call succeeds.
    async fn sign_out(&self) -> Result<(), String> {
        let Some(session) = self.session.lock().take() else {
            debug!("Sign-out without a session");
            self.bus.emit(AuthEvent::signed_out());
            return Ok(());
        };

        let result = self.logout_remote(&session.identity.access_token).await;
        if let Err(e) = &result {
            warn!(error = %e, "Remote sign-out failed");
        } else {
            info!(user_id = %session.identity.user_id, "Signed out");
        }
        self.bus.emit(AuthEvent::signed_out());
        result.map_err(|e| e.to_string())
    }
}
