// ABOUTME: Best-effort creation of the workspace's devbox manifest directory

pub mod ensurer;

pub use ensurer::{DevboxShellEnv, ManifestDirectoryEnsurer, ManifestError, ManifestStatus, ShellEnvRunner};
