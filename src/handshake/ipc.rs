// ABOUTME: Real ProcessLauncher backed by a Unix socket pair handed to the child
// The child end is advertised through NODE_CHANNEL_FD, the convention devbox reads

use crate::handshake::channel::{ChannelEvent, ProcessLauncher, SubprocessHandle};
use crate::handshake::error::ChannelError;
use std::path::Path;

/// Environment variable naming the inherited IPC descriptor.
pub const CHANNEL_FD_ENV: &str = "NODE_CHANNEL_FD";
/// Environment variable naming the IPC serialization mode.
pub const SERIALIZATION_MODE_ENV: &str = "NODE_CHANNEL_SERIALIZATION_MODE";

/// Launches processes with stdio inherited plus a newline-delimited JSON channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpcLauncher;

impl IpcLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ProcessLauncher for IpcLauncher {
    fn open(
        &self,
        program: &str,
        args: &[&str],
        working_dir: &Path,
    ) -> Result<SubprocessHandle, ChannelError> {
        unix::open(program, args, working_dir)
    }
}

#[cfg(not(unix))]
impl ProcessLauncher for IpcLauncher {
    fn open(
        &self,
        _program: &str,
        _args: &[&str],
        _working_dir: &Path,
    ) -> Result<SubprocessHandle, ChannelError> {
        Err(ChannelError::Unsupported)
    }
}

#[cfg(unix)]
mod unix {
    use super::{ChannelError, ChannelEvent, SubprocessHandle, CHANNEL_FD_ENV, SERIALIZATION_MODE_ENV};
    use crate::handshake::message::{HandshakeMessage, InboundMessage};
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream as StdUnixStream;
    use std::path::Path;
    use std::process::Stdio;
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::UnixStream;
    use tokio::process::{Child, Command};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    /// How long to keep draining the channel after the process exits.
    const DRAIN_GRACE: Duration = Duration::from_millis(500);

    /// Held from clearing close-on-exec until the parent's copy is closed.
    static SPAWN_LOCK: Mutex<()> = Mutex::new(());

    pub(super) fn open(
        program: &str,
        args: &[&str],
        working_dir: &Path,
    ) -> Result<SubprocessHandle, ChannelError> {
        let (parent_end, child_end) = StdUnixStream::pair()?;

        // While the child end is inheritable, any process spawned elsewhere in
        // this process picks it up and holds the channel open past our child's
        // exit. Launches through here are serialized; other spawners are only
        // covered by DRAIN_GRACE, so keep to one setup session per process.
        let spawn_guard = SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        // The child end must survive exec.
        let child_fd = child_end.as_raw_fd();
        fcntl(child_fd, FcntlArg::F_SETFD(FdFlag::empty()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(working_dir)
            .env(CHANNEL_FD_ENV, child_fd.to_string())
            .env(SERIALIZATION_MODE_ENV, "json")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);

        let child = command.spawn().map_err(|source| ChannelError::SpawnFailed {
            program: program.to_string(),
            source,
        })?;
        drop(child_end);
        drop(spawn_guard);

        let pid = child.id();
        info!("Launched {} {:?} (pid {:?}) in {}", program, args, pid, working_dir.display());

        parent_end.set_nonblocking(true)?;
        let stream = UnixStream::from_std(parent_end)?;
        let (read_half, write_half) = stream.into_split();

        // Both channels exist before anything is read from the child.
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_messages(read_half, event_tx.clone(), pid));
        tokio::spawn(write_messages(write_half, outbound_rx, pid));
        tokio::spawn(supervise(child, reader, event_tx));

        Ok(SubprocessHandle::new(pid, outbound_tx, event_rx))
    }

    async fn read_messages(
        read_half: OwnedReadHalf,
        events: mpsc::UnboundedSender<ChannelEvent>,
        pid: Option<u32>,
    ) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    // Any JSON value is delivered; only non-JSON text is dropped.
                    match InboundMessage::from_line(&line) {
                        Ok(message) => {
                            debug!("Received from pid {:?}: {}", pid, message);
                            if events.send(ChannelEvent::Message(message)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring malformed IPC line from pid {:?}: {}", pid, e),
                    }
                }
                Ok(None) => {
                    debug!("IPC channel of pid {:?} reached EOF", pid);
                    break;
                }
                Err(e) => {
                    debug!("IPC read from pid {:?} failed: {}", pid, e);
                    break;
                }
            }
        }
    }

    async fn write_messages(
        mut write_half: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<HandshakeMessage>,
        pid: Option<u32>,
    ) {
        while let Some(message) = outbound.recv().await {
            let line = match message.to_line() {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to encode IPC message {:?}: {}", message, e);
                    continue;
                }
            };
            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                debug!("IPC write to pid {:?} failed, process likely gone: {}", pid, e);
                break;
            }
            debug!("Sent to pid {:?}: {}", pid, line.trim_end());
        }
    }

    async fn supervise(
        mut child: Child,
        mut reader: JoinHandle<()>,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) {
        let exit_code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Failed to wait on subprocess: {}", e);
                None
            }
        };
        info!("Subprocess closed with exit code: {:?}", exit_code);

        // Messages written right before exit still come first.
        if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
            debug!("IPC channel still open after exit, detaching reader");
            reader.abort();
        }

        let _ = events.send(ChannelEvent::Closed { exit_code });
    }
}
