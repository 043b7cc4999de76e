//! Configured timings to runtime configs.

use portal_config_and_utils::SessionSettings;
use shepherd::{InactivityConfig, MachineConfig, RedirectConfig, RetryPolicy};

pub fn machine_config(settings: &SessionSettings) -> MachineConfig {
    MachineConfig {
        profile_timeout: settings.profile_timeout(),
        retry: RetryPolicy {
            max_attempts: settings.profile_max_attempts,
            delay: settings.profile_retry_delay(),
            not_found_grace: settings.profile_not_found_grace(),
        },
        ..MachineConfig::default()
    }
}

pub fn inactivity_config(settings: &SessionSettings) -> InactivityConfig {
    InactivityConfig {
        timeout: settings.idle_timeout(),
        warning: settings.idle_warning(),
    }
}

pub fn redirect_config(settings: &SessionSettings) -> RedirectConfig {
    RedirectConfig {
        landing_path: settings.landing_path.clone(),
        fallback: settings.redirect_fallback(),
    }
}
