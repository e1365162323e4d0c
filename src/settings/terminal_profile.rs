// ABOUTME: Terminal-profile writer selected by platform
// On macOS the editor's default terminal profile is pointed at the user's shell

use crate::settings::store::{SettingsError, SettingsStore};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

pub const PROFILES_KEY: &str = "terminal.integrated.profiles.osx";
pub const DEFAULT_PROFILE_KEY: &str = "terminal.integrated.defaultProfile.osx";
pub const PROFILE_NAME: &str = "devboxCompatibleShell";

const DEFAULT_SHELL: &str = "/bin/zsh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Applies environment-specific editor settings once setup has run.
pub trait EnvironmentConfigWriter: Send + Sync {
    fn apply(&self) -> Result<(), SettingsError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConfigWriter;

impl EnvironmentConfigWriter for NoopConfigWriter {
    fn apply(&self) -> Result<(), SettingsError> {
        debug!("No editor configuration needed on this platform");
        Ok(())
    }
}

/// Shell path plus the arguments a devbox terminal should start it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProfile {
    pub path: String,
    pub args: Vec<String>,
}

impl ShellProfile {
    pub fn from_env() -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SHELL.to_string());
        Self::for_shell(shell)
    }

    pub fn for_shell(path: impl Into<String>) -> Self {
        let path = path.into();
        let args = Self::args_for(Self::shell_type(&path));
        Self { path, args }
    }

    fn shell_type(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or(path)
    }

    fn args_for(shell_type: &str) -> Vec<String> {
        match shell_type {
            // fish_add_path prepends to PATH when the user config is sourced,
            // which would shadow devbox packages.
            "fish" => vec!["--no-config".to_string()],
            _ => Vec::new(),
        }
    }
}

pub struct TerminalProfileWriter {
    store: Arc<dyn SettingsStore>,
    shell: ShellProfile,
}

impl TerminalProfileWriter {
    pub fn new(store: Arc<dyn SettingsStore>, shell: ShellProfile) -> Self {
        Self { store, shell }
    }
}

impl EnvironmentConfigWriter for TerminalProfileWriter {
    fn apply(&self) -> Result<(), SettingsError> {
        info!("Setting default terminal profile to {} ({})", PROFILE_NAME, self.shell.path);

        let profiles = json!({
            PROFILE_NAME: {
                "path": self.shell.path,
                "args": self.shell.args,
            }
        });
        self.store.update(PROFILES_KEY, profiles)?;
        self.store.update(DEFAULT_PROFILE_KEY, json!(PROFILE_NAME))
    }
}

/// Real writer on macOS, no-op elsewhere.
pub fn writer_for_platform(
    platform: Platform,
    store: Arc<dyn SettingsStore>,
    shell: ShellProfile,
) -> Box<dyn EnvironmentConfigWriter> {
    match platform {
        Platform::MacOs => Box::new(TerminalProfileWriter::new(store, shell)),
        Platform::Linux | Platform::Other => Box::new(NoopConfigWriter),
    }
}
