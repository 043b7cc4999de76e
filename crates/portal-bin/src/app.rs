//! `sign-in` command: wire the session runtime to Supabase and drive it.

use crate::settings;
use crate::surfaces::{LogNavigator, LogNotifier};
use anyhow::Context;
use portal_config_and_utils::Config;
use shepherd::{
    AuthStateMachine, DocumentEvents, InactivityMonitor, InputKind, RedirectCoordinator, Session,
    SessionHandle, SessionStore, Visibility,
};
use std::sync::Arc;
use std::time::Duration;
use supabase_identity::{SupabaseClient, SupabaseIdentityProvider, SupabaseProfileStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Route the CLI pretends to start on.
const LOGIN_PATH: &str = "/login";

/// Refresh the access token this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Wait before retrying a refresh that failed transiently.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Sign in, wait for the profile to settle, print the session. With `watch`,
/// keep supervising the session until it ends or the user interrupts.
pub async fn sign_in(
    config: &Config,
    email: &str,
    password: &str,
    watch: bool,
) -> anyhow::Result<()> {
    let settings = &config.session;
    let client = SupabaseClient::new(&config.supabase_url, config.supabase_anon_key.clone())
        .context("Invalid Supabase URL")?;
    let provider = Arc::new(SupabaseIdentityProvider::new(client.clone()));
    let profiles = Arc::new(SupabaseProfileStore::new(client, Arc::clone(&provider)));

    let session = AuthStateMachine::new(provider.clone(), profiles, SessionStore::new())
        .with_config(settings::machine_config(settings))
        .start();
    let redirect = RedirectCoordinator::new(
        settings::redirect_config(settings),
        Arc::new(LogNavigator::new(LOGIN_PATH)),
        Arc::new(LogNotifier),
    )
    .spawn(session.subscribe());

    let result = async {
        let mut sessions = session.subscribe();
        // Retries and grace waits all fit inside the profile timeout.
        let settle_within = settings.profile_timeout() + Duration::from_secs(1);

        wait_for_session(&mut sessions, settle_within, |s| !s.loading).await?;

        let identity = provider
            .sign_in_with_password(email, password)
            .await
            .context("Sign-in failed")?;
        let settled = wait_for_session(&mut sessions, settle_within, |s| {
            s.user_id() == Some(identity.user_id.as_str()) && !s.loading
        })
        .await?;
        println!("{}", serde_json::to_string_pretty(&settled)?);

        if watch {
            supervise(config, &provider, &session, sessions).await?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    redirect.shutdown();
    session.shutdown();
    result
}

async fn wait_for_session(
    sessions: &mut watch::Receiver<Session>,
    within: Duration,
    ready: impl FnMut(&Session) -> bool,
) -> anyhow::Result<Session> {
    let snapshot = tokio::time::timeout(within, sessions.wait_for(ready))
        .await
        .context("Session did not settle in time")?
        .context("Session runtime stopped")?;
    Ok((*snapshot).clone())
}

/// When the held token should next be refreshed.
fn next_refresh(provider: &SupabaseIdentityProvider) -> Option<Instant> {
    provider
        .refresh_due_in(REFRESH_MARGIN)
        .map(|due| Instant::now() + due)
}

async fn refresh_timer(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Feed stdin into the inactivity monitor and keep the token fresh until the
/// session ends.
async fn supervise(
    config: &Config,
    provider: &SupabaseIdentityProvider,
    session: &SessionHandle,
    mut sessions: watch::Receiver<Session>,
) -> anyhow::Result<()> {
    let document = DocumentEvents::new();
    let monitor = InactivityMonitor::new(
        settings::inactivity_config(&config.session),
        Arc::new(document.clone()),
        Arc::new(LogNotifier),
    )
    .spawn(session.clone());

    info!("Watching session (hide, show, refresh, status, logout; other lines count as activity)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut refresh_at = next_refresh(provider);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                match line.trim() {
                    "hide" => document.set_visibility(Visibility::Hidden),
                    "show" => document.set_visibility(Visibility::Visible),
                    "refresh" => {
                        if let Err(e) = session.refresh_profile() {
                            warn!(error = %e, "Refresh rejected");
                        }
                    }
                    "status" => {
                        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
                        info!(state = ?session.state(), idle = ?monitor.status(), "Session status");
                    }
                    "logout" => {
                        session.sign_out().await;
                        break;
                    }
                    _ => document.dispatch(InputKind::KeyDown),
                }
            }
            _ = refresh_timer(refresh_at) => {
                match provider.refresh_session().await {
                    Ok(_) => refresh_at = next_refresh(provider),
                    Err(e) if e.is_transient() => {
                        warn!(error = %e, retry_in = ?REFRESH_RETRY_DELAY, "Token refresh failed, retrying");
                        refresh_at = Some(Instant::now() + REFRESH_RETRY_DELAY);
                    }
                    Err(e) => {
                        error!(error = %e, "Token refresh rejected, signing out");
                        session.sign_out().await;
                        break;
                    }
                }
            }
            changed = sessions.changed() => {
                if changed.is_err() || sessions.borrow().identity.is_none() {
                    info!("Session ended");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    monitor.shutdown();
    Ok(())
}
