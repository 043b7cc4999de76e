//! Thin wrapper over `reqwest` for the Supabase Auth and REST endpoints.

use crate::error::{SupabaseError, SupabaseResult};
use reqwest::{Method, RequestBuilder, Response};
use tracing::warn;
use url::Url;

/// Shared HTTP client bound to one Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url`
    /// (e.g. `https://xyz.supabase.co`).
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> SupabaseResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http_client: reqwest::Client::new(),
            base_url,
            anon_key: anon_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/auth/v1/{path}`.
    pub(crate) fn auth_url(&self, path: &str) -> SupabaseResult<Url> {
        Ok(self.base_url.join(&format!("auth/v1/{path}"))?)
    }

    /// `{base}/rest/v1/{table}`.
    pub(crate) fn rest_url(&self, table: &str) -> SupabaseResult<Url> {
        Ok(self.base_url.join(&format!("rest/v1/{table}"))?)
    }

    /// Request with the project API key attached. `bearer` defaults to the
    /// anon key when no user token is available.
    pub(crate) fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let bearer = bearer.unwrap_or(&self.anon_key);
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }
}

/// Turn a non-success response into [`SupabaseError::Api`].
pub(crate) async fn check(response: Response, operation: &str) -> SupabaseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body_len = body.len(), operation, "Supabase request failed");
    Err(SupabaseError::Api {
        status: status.as_u16(),
        body,
    })
}
