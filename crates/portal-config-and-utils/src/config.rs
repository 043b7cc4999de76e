//! Configuration management for the portal.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://ministry-media.supabase.co",
};

/// Default Supabase anon key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_LOG_LEVEL: &str = "MINISTRY_MEDIA_LOG_LEVEL";
const ENV_SUPABASE_URL: &str = "MINISTRY_MEDIA_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "MINISTRY_MEDIA_SUPABASE_ANON_KEY";

/// Main portal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to expose).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Session bootstrap and inactivity timings.
    #[serde(default)]
    pub session: SessionSettings,
}

/// Every timing constant the session bootstrap uses, in one place.
///
/// The state machine's profile timeout and the redirect fallback are two
/// independent timers; both are configured here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on one profile load, retries included.
    pub profile_timeout_ms: u64,
    /// Total attempts for transient profile fetch failures.
    pub profile_max_attempts: u32,
    /// Delay between transient retries.
    pub profile_retry_delay_ms: u64,
    /// Wait before the single retry of a not-yet-provisioned profile.
    pub profile_not_found_grace_ms: u64,
    /// Unconditional redirect after sign-in if the profile never settles.
    pub redirect_fallback_ms: u64,
    /// Authenticated landing route.
    pub landing_path: String,
    /// Idle period before forced sign-out.
    pub idle_timeout_ms: u64,
    /// How long before sign-out the warning is shown.
    pub idle_warning_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            profile_timeout_ms: 10_000,
            profile_max_attempts: 3,
            profile_retry_delay_ms: 2_000,
            profile_not_found_grace_ms: 2_000,
            redirect_fallback_ms: 8_000,
            landing_path: "/dashboard".to_string(),
            idle_timeout_ms: 5 * 60 * 1_000,
            idle_warning_ms: 30_000,
        }
    }
}

impl SessionSettings {
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_timeout_ms)
    }

    pub fn profile_retry_delay(&self) -> Duration {
        Duration::from_millis(self.profile_retry_delay_ms)
    }

    pub fn profile_not_found_grace(&self) -> Duration {
        Duration::from_millis(self.profile_not_found_grace_ms)
    }

    pub fn redirect_fallback(&self) -> Duration {
        Duration::from_millis(self.redirect_fallback_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn idle_warning(&self) -> Duration {
        Duration::from_millis(self.idle_warning_ms)
    }

    /// Reject settings the session runtime cannot honour.
    pub fn validate(&self) -> CoreResult<()> {
        if self.profile_max_attempts == 0 {
            return Err(CoreError::Config(
                "session.profile_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(CoreError::Config(
                "session.idle_timeout_ms must be positive".to_string(),
            ));
        }
        if self.idle_warning_ms >= self.idle_timeout_ms {
            return Err(CoreError::Config(format!(
                "session.idle_warning_ms ({}) must be shorter than session.idle_timeout_ms ({})",
                self.idle_warning_ms, self.idle_timeout_ms
            )));
        }
        if !self.landing_path.starts_with('/') {
            return Err(CoreError::Config(format!(
                "session.landing_path must be absolute, got {:?}",
                self.landing_path
            )));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            session: SessionSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from `paths`, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.session.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from environment variables. Blank values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = non_empty(ENV_SUPABASE_URL) {
            self.supabase_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = non_empty(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = key;
        }
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}
