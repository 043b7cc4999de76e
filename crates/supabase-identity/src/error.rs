//! Error types for the Supabase adapters.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupabaseError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supabase answered with a non-success status.
    #[error("Supabase returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Operation needs a session and there is none.
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SupabaseError {
    /// Returns true if retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SupabaseError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            SupabaseError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type alias using SupabaseError.
pub type SupabaseResult<T> = Result<T, SupabaseError>;
