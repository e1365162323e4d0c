// ABOUTME: Workspace-scoped key/value settings persistence
// JsonSettingsStore keeps settings in <workspace>/.vscode/settings.json

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Settings file {0} does not hold a JSON object")]
    NotAnObject(PathBuf),
}

/// Workspace-scoped settings sink. Setting a key replaces its previous value.
pub trait SettingsStore: Send + Sync {
    fn update(&self, key: &str, value: Value) -> Result<(), SettingsError>;
}

pub struct JsonSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self::with_path(workspace_root.join(".vscode").join("settings.json"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, SettingsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SettingsError::NotAnObject(self.path.clone())),
            Err(source) => Err(SettingsError::Json {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, settings: &Map<String, Value>) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

impl SettingsStore for JsonSettingsStore {
    fn update(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut settings = self.load()?;
        settings.insert(key.to_string(), value);
        self.save(&settings)?;

        debug!("Updated setting {} in {}", key, self.path.display());
        Ok(())
    }
}
