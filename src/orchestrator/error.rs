// ABOUTME: Terminal failure causes of a setup session
// Each collapses to the same user-visible failure but stays distinct in logs

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("No workspace folder is open")]
    NoWorkspace,

    #[error("Failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    /// Any message other than `{"status":"finished"}`, kept verbatim as JSON.
    #[error("Devbox sent {message} instead of finishing")]
    HandshakeRejected { message: String },

    #[error("Devbox exited before finishing setup (exit code {exit_code:?})")]
    SubprocessTerminatedEarly { exit_code: Option<i32> },
}
