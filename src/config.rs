//! User configuration
//!
//! A small TOML file in the platform config directory. Everything has a
//! default; a missing file is normal and a malformed one degrades to
//! defaults with a warning.

use colored::*;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How often the CLI drains the scan event channel.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overrides the platform-default database location.
    pub database_path: Option<PathBuf>,
    /// Event-drain cadence for the scan command, in milliseconds.
    pub poll_interval_ms: u64,
    /// Worker pool size for bulk signature imports.
    pub import_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            import_workers: crate::sigstore::IMPORT_WORKERS,
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = config_file_path() else {
            return Self::default();
        };
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                eprintln!(
                    "{} Ignoring malformed config {}: {}",
                    "Warning:".yellow(),
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Resolve the signature database location: explicit override first,
    /// then the config file, then the platform data directory.
    pub fn resolve_database_path(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.database_path.clone())
            .unwrap_or_else(default_database_path)
    }
}

fn config_file_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "vigil").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Platform data dir, or the working directory when none resolves.
pub fn default_database_path() -> PathBuf {
    ProjectDirs::from("", "", "vigil")
        .map(|dirs| dirs.data_dir().join("signatures.db"))
        .unwrap_or_else(|| PathBuf::from("signatures.db"))
}
