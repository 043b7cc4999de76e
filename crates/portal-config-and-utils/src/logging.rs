//! Logging initialization for the portal.
//!
//! Thin wrapper over the observability crate so the binary has one call to
//! make at startup.

use observability::LogConfig;
use std::path::PathBuf;

/// Initialize tracing for the portal.
///
/// * `level` - Default log level (trace, debug, info, warn, error);
///   `RUST_LOG` takes precedence when set.
/// * `json_log` - When set, also write structured JSONL to this file.
///
/// # Example
///
/// ```ignore
/// init_logging("info", None);
/// tracing::info!("portal started");
/// ```
pub fn init_logging(level: &str, json_log: Option<PathBuf>) {
    observability::init_with_config(LogConfig {
        service_name: "portal".into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        json_file: json_log.is_some(),
        log_path: json_log,
        ansi: std::env::var_os("NO_COLOR").is_none(),
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
