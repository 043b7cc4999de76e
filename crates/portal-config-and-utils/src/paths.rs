//! File system paths for the portal.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Runtime directory name under the user's home.
const BASE_DIR_NAME: &str = ".ministry-media";

/// Manages file system paths for the portal.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.ministry-media)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.ministry-media`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.ministry-media).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.ministry-media/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the logs directory (~/.ministry-media/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.ministry-media/logs/portal.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("portal.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
