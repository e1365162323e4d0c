// ABOUTME: ManifestDirectoryEnsurer runs `devbox shellenv` when the manifest directory is missing
// Failures are logged and reported as a status, never returned to the caller

use futures_util::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} shellenv exited with status {exit_code:?}")]
    NonZeroExit {
        program: String,
        exit_code: Option<i32>,
    },
}

/// What `ensure` observed. Exposed for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    AlreadyPresent,
    Initialized,
    InitializationFailed(String),
}

/// Runs the external tool's "emit shell environment" command.
pub trait ShellEnvRunner: Send + Sync {
    fn emit_shell_env<'a>(&'a self, working_dir: &'a Path) -> BoxFuture<'a, Result<(), ManifestError>>;
}

impl<T: ShellEnvRunner + ?Sized> ShellEnvRunner for std::sync::Arc<T> {
    fn emit_shell_env<'a>(&'a self, working_dir: &'a Path) -> BoxFuture<'a, Result<(), ManifestError>> {
        (**self).emit_shell_env(working_dir)
    }
}

/// `devbox shellenv` with output discarded.
#[derive(Debug, Clone)]
pub struct DevboxShellEnv {
    program: String,
}

impl DevboxShellEnv {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ShellEnvRunner for DevboxShellEnv {
    fn emit_shell_env<'a>(&'a self, working_dir: &'a Path) -> BoxFuture<'a, Result<(), ManifestError>> {
        Box::pin(async move {
            let status = tokio::process::Command::new(&self.program)
                .arg("shellenv")
                .current_dir(working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|source| ManifestError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;

            if !status.success() {
                return Err(ManifestError::NonZeroExit {
                    program: self.program.clone(),
                    exit_code: status.code(),
                });
            }
            Ok(())
        })
    }
}

pub struct ManifestDirectoryEnsurer<R: ShellEnvRunner> {
    runner: R,
    manifest_dir_name: String,
}

impl<R: ShellEnvRunner> ManifestDirectoryEnsurer<R> {
    pub fn new(runner: R, manifest_dir_name: impl Into<String>) -> Self {
        Self {
            runner,
            manifest_dir_name: manifest_dir_name.into(),
        }
    }

    pub fn manifest_dir(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.manifest_dir_name)
    }

    /// Make sure the manifest directory exists, at most one `shellenv` call.
    pub async fn ensure(&self, working_dir: &Path) -> ManifestStatus {
        let manifest_dir = self.manifest_dir(working_dir);

        if tokio::fs::metadata(&manifest_dir).await.is_ok() {
            debug!("Manifest directory {} already present", manifest_dir.display());
            return ManifestStatus::AlreadyPresent;
        }

        info!("Manifest directory {} missing, running shellenv", manifest_dir.display());
        match self.runner.emit_shell_env(working_dir).await {
            Ok(()) => ManifestStatus::Initialized,
            Err(e) => {
                // Integration recreates whatever state is still missing.
                warn!("Best-effort manifest initialization failed: {}", e);
                ManifestStatus::InitializationFailed(e.to_string())
            }
        }
    }
}
