// ABOUTME: Editor settings applied after setup so new terminals start in a devbox-compatible shell
// A platform seam picks the real writer on macOS and a no-op everywhere else

pub mod store;
pub mod terminal_profile;

pub use store::{JsonSettingsStore, SettingsError, SettingsStore};
pub use terminal_profile::{
    writer_for_platform, EnvironmentConfigWriter, NoopConfigWriter, Platform, ShellProfile,
    TerminalProfileWriter,
};
