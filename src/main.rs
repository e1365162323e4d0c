// ABOUTME: Main entry point for the devbox-setup command line tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devbox_setup::config::SetupConfig;
use devbox_setup::host::HostServices;
use devbox_setup::manifest::{DevboxShellEnv, ManifestDirectoryEnsurer};
use devbox_setup::orchestrator::SetupOrchestrator;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "devbox-setup", version, about = "Set up a Devbox environment for an editor workspace")]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, short)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to <config dir>/devbox-setup/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// devbox executable to call
    #[arg(long)]
    devbox: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full setup workflow (default)
    ///
    /// Ctrl-C stops waiting for devbox, but devbox runs in the same terminal
    /// and receives the same interrupt, so it usually stops too.
    Setup,
    /// Only create the manifest directory if it is missing
    EnsureManifest,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("devbox-setup failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = SetupConfig::load(cli.config.as_deref())?;
    if let Some(devbox) = cli.devbox {
        config.devbox_executable = devbox;
    }
    setup_logging(config.debug)?;

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", workspace.display()))?;

    match cli.command.unwrap_or(Command::Setup) {
        Command::Setup => run_setup(config, workspace).await,
        Command::EnsureManifest => {
            let ensurer = ManifestDirectoryEnsurer::new(
                DevboxShellEnv::new(config.devbox_executable.clone()),
                config.manifest_dir_name.clone(),
            );
            let status = ensurer.ensure(&workspace).await;
            info!("Manifest status: {:?}", status);
            eprintln!("{}: {:?}", ensurer.manifest_dir(&workspace).display(), status);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_setup(config: SetupConfig, workspace: PathBuf) -> Result<ExitCode> {
    eprintln!("Setting up your Devbox environment. Please don't close your editor.");

    let orchestrator = SetupOrchestrator::for_workspace(config, &workspace, HostServices::console());

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let session = orchestrator.run(Some(&workspace), &cancel).await;
    info!(
        "Session {} ended in {:?} {}",
        session.id,
        session.phase(),
        session.outcome().indicator()
    );

    if session.cancellation_requested() {
        // SIGINT goes to the whole foreground process group, devbox included.
        eprintln!("Setup cancelled. devbox received the same interrupt and has likely stopped as well.");
        return Ok(ExitCode::from(130));
    }
    Ok(if session.outcome().is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn setup_logging(debug: bool) -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = dirs::home_dir()
        .map(|home| home.join(".devbox-setup").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".devbox-setup/logs"));

    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let log_file = log_dir.join(format!(
        "devbox-setup-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file: {}", log_file.display()))?;

    let default_filter = if debug { "devbox_setup=debug" } else { "devbox_setup=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    Ok(())
}
