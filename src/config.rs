// ABOUTME: Configuration for the setup workflow loaded from TOML with environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replaces the devbox executable, e.g. with a locally compiled build.
pub const EXECUTABLE_ENV: &str = "DEVBOX_SETUP_EXECUTABLE";
/// Turns on debug logging when it parses as a true boolean.
pub const DEBUG_ENV: &str = "DEVBOX_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Program used for `shellenv` and `integrate vscode`
    pub devbox_executable: String,
    /// Directory whose existence marks an initialized workspace
    pub manifest_dir_name: String,
    /// Host command issued once the environment is ready
    pub close_window_command: String,
    pub debug: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            devbox_executable: "devbox".to_string(),
            manifest_dir_name: ".devbox".to_string(),
            close_window_command: "workbench.action.closeWindow".to_string(),
            debug: false,
        }
    }
}

impl SetupConfig {
    /// Default location: `<config_dir>/devbox-setup/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("devbox-setup").join("config.toml"))
    }

    /// Load from `path` if given (it must exist), otherwise from the default
    /// location when present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(default) => Self::from_file(&default)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(exe) = lookup(EXECUTABLE_ENV).filter(|v| !v.is_empty()) {
            self.devbox_executable = exe;
        }
        if let Some(flag) = lookup(DEBUG_ENV) {
            self.debug = parse_bool(&flag).unwrap_or(false);
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
