//! Configuration management for cmdrack.
//!
//! This module defines the structure of the optional `cmdrack.toml` file and
//! provides functionality to load and parse it. Command-line flags override
//! every value read here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE: &str = "cmdrack.toml";

/// Top-level configuration structure corresponding to `cmdrack.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path of the JSON profile store.
    pub profiles_file: Option<PathBuf>,
    /// Shell prefix used to run commands (e.g. "bash -lc").
    pub shell: Option<String>,
    /// Maximum number of output lines kept per tab.
    pub max_lines: Option<usize>,
    /// Whether to use Unicode symbols in the TUI (default: true).
    pub symbols: Option<bool>,
    /// File that receives log output.
    pub log_file: Option<PathBuf>,
    /// Log filter directive (e.g. "debug" or "cmdrack=trace").
    pub log_level: Option<String>,
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// `cmdrack.toml` in the current directory, if present.
pub fn default_config_path() -> Option<PathBuf> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}
