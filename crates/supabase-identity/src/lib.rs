//! Supabase adapters for the Ministry Media session runtime.
//!
//! This crate provides:
//! - Email/password sign-in, token refresh, and sign-out against Supabase Auth
//! - Profile lookups against the `profiles` table through PostgREST
//! - Mapping of PostgREST error codes onto profile-store failure classes

mod client;
mod error;
mod identity_provider;
mod profile_store;

pub use client::SupabaseClient;
pub use error::{SupabaseError, SupabaseResult};
pub use identity_provider::SupabaseIdentityProvider;
pub use profile_store::SupabaseProfileStore;
