// ABOUTME: Setup workflow orchestration for a workspace
// Sequences manifest creation, config update, devbox launch and the handshake wait

pub mod error;
pub mod setup;

pub use error::SetupError;
pub use setup::{SetupOrchestrator, FAILURE_MESSAGE, INTEGRATE_ARGS};
