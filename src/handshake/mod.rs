// ABOUTME: Structured-message channel to the devbox subprocess
// Wraps process launch, the JSON handshake and process termination as one event stream

pub mod channel;
pub mod error;
pub mod ipc;
pub mod message;

pub use channel::{ChannelEvent, ProcessLauncher, SubprocessHandle};
pub use error::ChannelError;
pub use ipc::IpcLauncher;
pub use message::{HandshakeMessage, InboundMessage};
