// ABOUTME: Terminal implementations of the host interfaces used by the CLI

use crate::host::{CommandRunner, Notifier, ProgressReporter};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn report(&self, message: &str, increment: u8) {
        info!("Progress {}%: {}", increment, message);
        eprintln!("[{:>3}%] {}", increment, message);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_error(&self, message: &str) {
        error!("{}", message);
        eprintln!("error: {}", message);
    }
}

/// There is no editor window to close from a terminal, so the reload
/// request becomes a hint to the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleCommandRunner;

impl CommandRunner for ConsoleCommandRunner {
    fn execute_command(&self, command: &str) {
        info!("Host command requested: {}", command);
        eprintln!("Devbox environment is ready. Reopen your editor to pick it up.");
    }
}
