// ABOUTME: End-to-end tests of the setup state machine against a synthetic devbox
// The fake subprocess is driven by in-memory channels so event races are deterministic

use devbox_setup::config::SetupConfig;
use devbox_setup::handshake::{
    ChannelError, ChannelEvent, HandshakeMessage, InboundMessage, ProcessLauncher, SubprocessHandle,
};
use devbox_setup::host::{CommandRunner, HostServices, Notifier, ProgressReporter};
use devbox_setup::manifest::{ManifestError, ShellEnvRunner};
use devbox_setup::models::{ProgressMilestone, SetupOutcome, SetupPhase};
use devbox_setup::orchestrator::{SetupError, SetupOrchestrator, FAILURE_MESSAGE, INTEGRATE_ARGS};
use devbox_setup::settings::NoopConfigWriter;
use futures_util::future::BoxFuture;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Shared, ordered record of everything the host and the fake process saw.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn progress(&self) -> Vec<String> {
        self.entries().into_iter().filter(|e| e.starts_with("progress:")).collect()
    }

    fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl ProgressReporter for Journal {
    fn report(&self, _message: &str, increment: u8) {
        self.push(format!("progress:{}", increment));
    }
}

impl Notifier for Journal {
    fn show_error(&self, message: &str) {
        self.push(format!("error:{}", message));
    }
}

impl CommandRunner for Journal {
    fn execute_command(&self, command: &str) {
        self.push(format!("command:{}", command));
    }
}

struct NoShellEnv;

impl ShellEnvRunner for NoShellEnv {
    fn emit_shell_env<'a>(&'a self, _working_dir: &'a Path) -> BoxFuture<'a, Result<(), ManifestError>> {
        Box::pin(async { Ok(()) })
    }
}

/// What the fake devbox does once it has the configDir message.
#[derive(Clone)]
enum Script {
    Reply(Vec<ChannelEvent>),
    /// Cancel the host's token, then keep working and exit on its own.
    CancelHost {
        token: CancellationToken,
        exited: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    },
}

struct FakeDevbox {
    journal: Journal,
    script: Script,
}

impl ProcessLauncher for FakeDevbox {
    fn open(&self, program: &str, args: &[&str], working_dir: &Path) -> Result<SubprocessHandle, ChannelError> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<HandshakeMessage>();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        self.journal.push(format!("launch:{} {}", program, args.join(" ")));
        self.journal.push(format!("cwd:{}", working_dir.display()));

        let journal = self.journal.clone();
        let script = self.script.clone();
        tokio::spawn(async move {
            let Some(first) = out_rx.recv().await else { return };
            journal.push(format!("received:{}", first.config_dir.unwrap_or_default()));
            match script {
                Script::Reply(events) => {
                    for event in events {
                        let _ = ev_tx.send(event);
                    }
                }
                Script::CancelHost { token, exited } => {
                    token.cancel();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    if let Some(tx) = exited.lock().unwrap().take() {
                        let _ = tx.send(());
                    }
                    let _ = ev_tx.send(ChannelEvent::Closed { exit_code: Some(0) });
                }
            }
        });

        Ok(SubprocessHandle::new(Some(1234), out_tx, ev_rx))
    }
}

fn orchestrator(journal: &Journal, script: Script) -> SetupOrchestrator {
    let host = HostServices::new(
        Arc::new(journal.clone()),
        Arc::new(journal.clone()),
        Arc::new(journal.clone()),
    );
    SetupOrchestrator::new(
        SetupConfig::default(),
        Arc::new(NoShellEnv),
        Arc::new(FakeDevbox {
            journal: journal.clone(),
            script,
        }),
        Box::new(NoopConfigWriter),
        host,
    )
}

#[tokio::test]
async fn test_successful_run_reports_milestones_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let journal = Journal::default();
    let orchestrator = orchestrator(
        &journal,
        Script::Reply(vec![ChannelEvent::Message(HandshakeMessage::finished().into())]),
    );

    let session = orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

    assert_eq!(session.outcome(), &SetupOutcome::Succeeded);
    assert_eq!(
        journal.progress(),
        vec!["progress:25", "progress:50", "progress:80", "progress:100"]
    );
    assert_eq!(journal.count("command:workbench.action.closeWindow"), 1);
    assert_eq!(journal.count("error:"), 0);
}

#[tokio::test]
async fn test_handshake_is_sent_after_launch_and_before_reply_is_handled() {
    let temp_dir = TempDir::new().unwrap();
    let journal = Journal::default();
    let orchestrator = orchestrator(
        &journal,
        Script::Reply(vec![ChannelEvent::Message(HandshakeMessage::finished().into())]),
    );

    orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

    let entries = journal.entries();
    let position = |prefix: &str| entries.iter().position(|e| e.starts_with(prefix)).unwrap();
    assert_eq!(entries[position("launch:")], format!("launch:devbox {}", INTEGRATE_ARGS.join(" ")));
    assert_eq!(entries[position("cwd:")], format!("cwd:{}", temp_dir.path().display()));
    assert_eq!(
        entries[position("received:")],
        format!("received:{}", temp_dir.path().display())
    );
    assert!(position("launch:") < position("received:"));
    assert!(position("received:") < position("progress:100"));
}

#[tokio::test]
async fn test_messages_after_finished_do_not_change_outcome() {
    let temp_dir = TempDir::new().unwrap();
    let journal = Journal::default();
    let orchestrator = orchestrator(
        &journal,
        Script::Reply(vec![
            ChannelEvent::Message(HandshakeMessage::finished().into()),
            ChannelEvent::Message(HandshakeMessage::status("error").into()),
            ChannelEvent::Closed { exit_code: Some(1) },
        ]),
    );

    let session = orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

    assert_eq!(session.outcome(), &SetupOutcome::Succeeded);
    assert_eq!(journal.count("command:"), 1);
    assert_eq!(journal.count("error:"), 0);
}

#[tokio::test]
async fn test_close_before_finished_fails_for_any_exit_code() {
    for exit_code in [Some(0), Some(1), Some(137), None] {
        let temp_dir = TempDir::new().unwrap();
        let journal = Journal::default();
        let orchestrator = orchestrator(
            &journal,
            Script::Reply(vec![
                ChannelEvent::Closed { exit_code },
                ChannelEvent::Message(HandshakeMessage::finished().into()),
            ]),
        );

        let session = orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

        assert_eq!(
            session.outcome(),
            &SetupOutcome::Failed(SetupError::SubprocessTerminatedEarly { exit_code })
        );
        assert_eq!(session.phase(), SetupPhase::Resolved { success: false });
        assert_eq!(journal.entries().iter().filter(|e| **e == format!("error:{}", FAILURE_MESSAGE)).count(), 1);
        assert_eq!(journal.count("progress:100"), 0);
        assert_eq!(journal.count("command:"), 0);
    }
}

#[tokio::test]
async fn test_non_finished_status_fails_before_close() {
    let temp_dir = TempDir::new().unwrap();
    let journal = Journal::default();
    let orchestrator = orchestrator(
        &journal,
        Script::Reply(vec![ChannelEvent::Message(HandshakeMessage::status("installing").into())]),
    );

    let session = orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

    assert_eq!(
        session.outcome(),
        &SetupOutcome::Failed(SetupError::HandshakeRejected {
            message: r#"{"status":"installing"}"#.to_string()
        })
    );
    assert_eq!(journal.count("error:"), 1);
    assert_eq!(journal.progress(), vec!["progress:25", "progress:50", "progress:80"]);
}

#[tokio::test]
async fn test_finished_lookalikes_fail_without_final_milestone() {
    for line in [r#"["finished"]"#, r#""finished""#, r#"{"status":1}"#, r#"{"status":true}"#] {
        let temp_dir = TempDir::new().unwrap();
        let journal = Journal::default();
        let reply = InboundMessage::from_line(line).unwrap();
        let orchestrator = orchestrator(
            &journal,
            Script::Reply(vec![
                ChannelEvent::Message(reply),
                ChannelEvent::Message(HandshakeMessage::finished().into()),
                ChannelEvent::Closed { exit_code: Some(0) },
            ]),
        );

        let session = orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

        assert_eq!(
            session.outcome(),
            &SetupOutcome::Failed(SetupError::HandshakeRejected {
                message: line.to_string()
            }),
            "{} must be rejected",
            line
        );
        assert_eq!(journal.count("error:"), 1, "{} must notify exactly once", line);
        assert_eq!(journal.count("progress:100"), 0, "{} must not complete progress", line);
        assert_eq!(journal.count("command:"), 0);
    }
}

#[tokio::test]
async fn test_dropped_channel_counts_as_early_exit() {
    let temp_dir = TempDir::new().unwrap();
    let journal = Journal::default();
    let orchestrator = orchestrator(&journal, Script::Reply(Vec::new()));

    let session = orchestrator.run(Some(temp_dir.path()), &CancellationToken::new()).await;

    assert_eq!(
        session.outcome(),
        &SetupOutcome::Failed(SetupError::SubprocessTerminatedEarly { exit_code: None })
    );
}

#[tokio::test]
async fn test_cancellation_is_advisory() {
    let temp_dir = TempDir::new().unwrap();
    let journal = Journal::default();
    let (exited_tx, exited_rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let orchestrator = orchestrator(
        &journal,
        Script::CancelHost {
            token: cancel.clone(),
            exited: Arc::new(Mutex::new(Some(exited_tx))),
        },
    );

    let session = orchestrator.run(Some(temp_dir.path()), &cancel).await;

    assert!(session.cancellation_requested());
    assert_eq!(session.outcome(), &SetupOutcome::Pending);
    assert_eq!(session.phase(), SetupPhase::AwaitingHandshake);
    assert_eq!(session.last_milestone(), Some(ProgressMilestone::CallingDevbox));
    assert_eq!(journal.count("error:"), 0);
    assert_eq!(journal.count("command:"), 0);

    // The fake process keeps running to completion after we stop waiting.
    tokio::time::timeout(Duration::from_secs(5), exited_rx)
        .await
        .expect("subprocess should finish on its own")
        .unwrap();
}
