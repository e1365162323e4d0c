// ABOUTME: SetupOrchestrator drives one setup session to success or failure
// The handshake wait is a single select over cancellation and the channel's next event

use crate::config::SetupConfig;
use crate::handshake::{ChannelEvent, HandshakeMessage, IpcLauncher, ProcessLauncher};
use crate::host::HostServices;
use crate::manifest::{DevboxShellEnv, ManifestDirectoryEnsurer, ShellEnvRunner};
use crate::models::{ProgressMilestone, SetupOutcome, SetupPhase, SetupSession};
use crate::orchestrator::error::SetupError;
use crate::settings::{writer_for_platform, EnvironmentConfigWriter, JsonSettingsStore, Platform, ShellProfile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The one error users see, whatever the cause.
pub const FAILURE_MESSAGE: &str = "Failed to setup devbox environment.";

/// Arguments for the long-running integration command.
pub const INTEGRATE_ARGS: [&str; 2] = ["integrate", "vscode"];

pub struct SetupOrchestrator {
    config: SetupConfig,
    ensurer: ManifestDirectoryEnsurer<Arc<dyn ShellEnvRunner>>,
    launcher: Arc<dyn ProcessLauncher>,
    config_writer: Box<dyn EnvironmentConfigWriter>,
    host: HostServices,
}

impl SetupOrchestrator {
    pub fn new(
        config: SetupConfig,
        shell_env: Arc<dyn ShellEnvRunner>,
        launcher: Arc<dyn ProcessLauncher>,
        config_writer: Box<dyn EnvironmentConfigWriter>,
        host: HostServices,
    ) -> Self {
        let ensurer = ManifestDirectoryEnsurer::new(shell_env, config.manifest_dir_name.clone());
        Self {
            config,
            ensurer,
            launcher,
            config_writer,
            host,
        }
    }

    /// Wire the real devbox, IPC launcher and platform writer for a workspace.
    pub fn for_workspace(config: SetupConfig, workspace_root: &Path, host: HostServices) -> Self {
        let shell_env: Arc<dyn ShellEnvRunner> =
            Arc::new(DevboxShellEnv::new(config.devbox_executable.clone()));
        let store = Arc::new(JsonSettingsStore::for_workspace(workspace_root));
        let writer = writer_for_platform(Platform::current(), store, ShellProfile::from_env());

        Self::new(config, shell_env, Arc::new(IpcLauncher::new()), writer, host)
    }

    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    /// Run one setup session. Returns the finished session; its outcome stays
    /// `Pending` only when the run was cancelled.
    pub async fn run(&self, workspace_root: Option<&Path>, cancel: &CancellationToken) -> SetupSession {
        let Some(root) = workspace_root else {
            let session = SetupSession::new(PathBuf::new(), &self.config.manifest_dir_name);
            return self.fail(session, SetupError::NoWorkspace);
        };

        let mut session = SetupSession::new(root, &self.config.manifest_dir_name);
        info!("Starting devbox setup session {} in {}", session.id, root.display());

        if cancel.is_cancelled() {
            return Self::cancelled(session);
        }

        session.advance(SetupPhase::EnsuringManifest);
        self.report(&mut session, ProgressMilestone::InstallingPackages, cancel);

        let status = tokio::select! {
            biased;
            () = cancel.cancelled() => return Self::cancelled(session),
            status = self.ensurer.ensure(root) => status,
        };
        debug!("Manifest status for session {}: {:?}", session.id, status);
        session.record_manifest_status(status);

        session.advance(SetupPhase::Launching);
        if let Err(e) = self.config_writer.apply() {
            warn!("Failed to update editor configuration: {}", e);
        }
        self.report(&mut session, ProgressMilestone::UpdatingConfiguration, cancel);

        if cancel.is_cancelled() {
            return Self::cancelled(session);
        }

        let program = self.config.devbox_executable.as_str();
        let mut handle = match self.launcher.open(program, &INTEGRATE_ARGS, root) {
            Ok(handle) => handle,
            Err(e) => {
                let err = SetupError::LaunchFailed {
                    program: program.to_string(),
                    reason: e.to_string(),
                };
                return self.fail(session, err);
            }
        };

        // The event stream already exists, so a reply cannot be missed.
        handle.send(HandshakeMessage::config_dir(root));
        session.advance(SetupPhase::AwaitingHandshake);
        self.report(&mut session, ProgressMilestone::CallingDevbox, cancel);

        // No timeout: devbox may take arbitrarily long to build the environment.
        let pid = handle.pid();
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Detaching from subprocess {:?} without killing it", pid);
                return Self::cancelled(session);
            }
            event = handle.next_event() => event,
        };
        drop(handle);

        match event {
            Some(ChannelEvent::Message(message)) if message.is_finished() => self.succeed(session),
            Some(ChannelEvent::Message(message)) => {
                warn!("Unexpected handshake message: {}", message);
                self.fail(session, SetupError::HandshakeRejected { message: message.to_string() })
            }
            Some(ChannelEvent::Closed { exit_code }) => {
                self.fail(session, SetupError::SubprocessTerminatedEarly { exit_code })
            }
            None => self.fail(session, SetupError::SubprocessTerminatedEarly { exit_code: None }),
        }
    }

    /// Intermediate milestones are withheld once the user has cancelled.
    fn report(&self, session: &mut SetupSession, milestone: ProgressMilestone, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            debug!("Withholding {:?} for cancelled session {}", milestone, session.id);
            session.request_cancellation();
            return;
        }
        self.emit(session, milestone);
    }

    fn emit(&self, session: &mut SetupSession, milestone: ProgressMilestone) {
        if session.try_milestone(milestone) {
            self.host.progress.report(milestone.message(), milestone.percent());
        }
    }

    fn succeed(&self, mut session: SetupSession) -> SetupSession {
        self.emit(&mut session, ProgressMilestone::Finished);
        if session.resolve(SetupOutcome::Succeeded) {
            info!("Devbox setup session {} finished", session.id);
            self.host.commands.execute_command(&self.config.close_window_command);
        }
        session
    }

    fn fail(&self, mut session: SetupSession, err: SetupError) -> SetupSession {
        error!("Devbox setup session {} failed: {}", session.id, err);
        if session.resolve(SetupOutcome::Failed(err)) {
            self.host.notifier.show_error(FAILURE_MESSAGE);
        }
        session
    }

    fn cancelled(mut session: SetupSession) -> SetupSession {
        info!("User canceled the long running operation");
        session.request_cancellation();
        session
    }
}
