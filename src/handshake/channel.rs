// ABOUTME: SubprocessHandle and the launcher seam the orchestrator opens channels through
// Inbound messages and process close arrive on one ordered event stream

use crate::handshake::error::ChannelError;
use crate::handshake::message::{HandshakeMessage, InboundMessage};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

/// Something observed on the channel to a running subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(InboundMessage),
    /// The process terminated. Sent once; `None` when killed by a signal.
    Closed { exit_code: Option<i32> },
}

/// Starts the external tool with a structured-message channel attached.
pub trait ProcessLauncher: Send + Sync {
    fn open(
        &self,
        program: &str,
        args: &[&str],
        working_dir: &Path,
    ) -> Result<SubprocessHandle, ChannelError>;
}

/// A running external-tool process as seen by the orchestrator.
///
/// Dropping the handle detaches all observers. It never kills the process.
pub struct SubprocessHandle {
    pid: Option<u32>,
    outbound: mpsc::UnboundedSender<HandshakeMessage>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl SubprocessHandle {
    /// Build a handle from its channel ends. The event receiver must exist
    /// before the process can produce anything, so no event is ever missed.
    pub fn new(
        pid: Option<u32>,
        outbound: mpsc::UnboundedSender<HandshakeMessage>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        Self {
            pid,
            outbound,
            events,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Queue one message for the subprocess. Silently dropped once the
    /// process has gone away.
    pub fn send(&self, message: HandshakeMessage) {
        if self.outbound.send(message).is_err() {
            debug!("Subprocess {:?} no longer accepts messages, dropping send", self.pid);
        }
    }

    /// Next inbound event in arrival order. `None` means every producer is
    /// gone without ever reporting a close.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

impl std::fmt::Debug for SubprocessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessHandle")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
