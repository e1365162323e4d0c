// ABOUTME: Error types for launching the devbox subprocess and its IPC channel

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IPC socket setup failed: {0}")]
    SocketSetup(String),

    #[error("IPC channels are not supported on this platform")]
    Unsupported,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(unix)]
impl From<nix::Error> for ChannelError {
    fn from(err: nix::Error) -> Self {
        ChannelError::SocketSetup(err.to_string())
    }
}
