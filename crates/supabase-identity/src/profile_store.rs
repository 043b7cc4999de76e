//! Profile lookups against the `profiles` table.

use crate::client::SupabaseClient;
use crate::identity_provider::SupabaseIdentityProvider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use shepherd::{Profile, ProfileStore, ProfileStoreError};
use std::sync::Arc;
use tracing::debug;

const PROFILE_COLUMNS: &str = "id,email,role,ministry_id,organisation_id,first_name,last_name";

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a failed PostgREST response onto a profile-store failure class.
///
/// | Response                         | Class              |
/// |----------------------------------|--------------------|
/// | 406 or code `PGRST116` (no rows) | `NotFound`         |
/// | 401, 403, or code `42501`        | `PermissionDenied` |
/// | anything else                    | `Unavailable`      |
fn classify(status: u16, body: &str) -> ProfileStoreError {
    let error: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = error
        .message
        .unwrap_or_else(|| format!("Profile request failed with HTTP {status}"));

    match (status, error.code.as_deref()) {
        (406, _) | (_, Some("PGRST116")) => ProfileStoreError::NotFound,
        (401 | 403, _) | (_, Some("42501")) => ProfileStoreError::PermissionDenied(message),
        _ => ProfileStoreError::Unavailable(message),
    }
}

/// [`ProfileStore`] backed by Supabase REST, authenticated with the signed-in
/// user's token so row-level security applies.
pub struct SupabaseProfileStore {
    client: SupabaseClient,
    tokens: Arc<SupabaseIdentityProvider>,
}

impl SupabaseProfileStore {
    pub fn new(client: SupabaseClient, tokens: Arc<SupabaseIdentityProvider>) -> Self {
        Self { client, tokens }
    }
}

#[async_trait]
impl ProfileStore for SupabaseProfileStore {
    async fn get_by_identity_id(&self, identity_id: &str) -> Result<Profile, ProfileStoreError> {
        let mut url = self
            .client
            .rest_url("profiles")
            .map_err(|e| ProfileStoreError::Unavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{identity_id}"))
            .append_pair("select", PROFILE_COLUMNS);

        debug!(user_id = %identity_id, "Fetching profile from Supabase");

        let token = self.tokens.access_token();
        let response = self
            .client
            .request(Method::GET, url, token.as_deref())
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(|e| ProfileStoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &body));
        }

        response
            .json::<Profile>()
            .await
            .map_err(|e| ProfileStoreError::Unavailable(format!("Malformed profile row: {e}")))
    }
}
