// ABOUTME: Interfaces the setup workflow consumes from its host editor
// Progress display, error notifications and command execution

pub mod console;

pub use console::{ConsoleCommandRunner, ConsoleNotifier, ConsoleProgress};

use std::sync::Arc;

/// Receives progress milestones. `increment` is the milestone percentage.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressReporter: Send + Sync {
    fn report(&self, message: &str, increment: u8);
}

/// Shows a user-visible error.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn show_error(&self, message: &str);
}

/// Runs a host command by identifier, e.g. closing the editor window.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    fn execute_command(&self, command: &str);
}

/// The host-side sinks one setup run talks to.
#[derive(Clone)]
pub struct HostServices {
    pub progress: Arc<dyn ProgressReporter>,
    pub notifier: Arc<dyn Notifier>,
    pub commands: Arc<dyn CommandRunner>,
}

impl HostServices {
    pub fn new(
        progress: Arc<dyn ProgressReporter>,
        notifier: Arc<dyn Notifier>,
        commands: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            progress,
            notifier,
            commands,
        }
    }

    pub fn console() -> Self {
        Self::new(
            Arc::new(ConsoleProgress),
            Arc::new(ConsoleNotifier),
            Arc::new(ConsoleCommandRunner),
        )
    }
}
