//! # Observability
//!
//! Centralized tracing setup for the Ministry Media portal.
//!
//! Crates in the workspace are **log producers** only. They use the standard
//! `tracing` macros and never decide where output goes. The binary calls
//! [`init_with_config`] once at startup, which installs:
//!
//! - a compact, human-readable stderr layer
//! - optionally, a JSONL file layer (`~/.ministry-media/logs/portal.jsonl`)
//!   suitable for `tail -f ... | jq` or `lnav`
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "portal".into(),
//!         default_level: "debug".into(),
//!         json_file: true,
//!         ..Default::default()
//!     });
//!
//!     tracing::info!("portal started");
//! }
//! ```

mod file_sink;
mod json_layer;

use std::path::PathBuf;

pub use file_sink::{default_log_path, FileLogWriter};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "portal", "ministry-portal").
    /// Included in every JSONL line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Also write structured JSONL to a log file.
    pub json_file: bool,

    /// Optional custom log file path.
    /// Defaults to `~/.ministry-media/logs/portal.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Emit ANSI colours on stderr.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            json_file: false,
            log_path: None,
            ansi: true,
        }
    }
}

/// Initialize the observability layer with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the observability layer with custom configuration.
///
/// Installing a global subscriber twice is not an error: the second call is
/// ignored so tests and embedding hosts can call this freely.
pub fn init_with_config(config: LogConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let env_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_filter(env_filter());

    let (json_layer, log_path) = if config.json_file {
        let path = config.log_path.clone().unwrap_or_else(default_log_path);
        match FileLogWriter::open(&path) {
            Ok(writer) => (
                Some(JsonLayer::new(config.service_name.clone(), writer).with_filter(env_filter())),
                Some(path),
            ),
            Err(e) => {
                eprintln!("observability: cannot open {}: {e}", path.display());
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?log_path,
            "observability initialized"
        );
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
