//! Integration tests for the session runtime.
//!
//! - `harness.rs`       - Fakes for the provider, profile store, notifier, router
//! - `bootstrap.rs`     - Startup, event ordering, stale results, shutdown
//! - `profile_retry.rs` - Grace retry, retry budget, manual refresh
//! - `sign_out.rs`      - Sign-out clears local state whatever the remote does
//! - `inactivity.rs`    - Idle warning, idle sign-out, visibility pause
//! - `redirect.rs`      - One redirect per sign-in, fallback wait

mod bootstrap;
pub(crate) mod harness;
mod profile_retry;
