// ABOUTME: SetupSession data model tracking one run of the setup workflow
// Holds the phase machine, the resolved outcome and the progress high-water mark

use crate::manifest::ManifestStatus;
use crate::orchestrator::SetupError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Where a session currently is in the setup workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    NotStarted,
    EnsuringManifest,
    Launching,
    AwaitingHandshake,
    Resolved { success: bool },
}

impl SetupPhase {
    fn rank(self) -> u8 {
        match self {
            SetupPhase::NotStarted => 0,
            SetupPhase::EnsuringManifest => 1,
            SetupPhase::Launching => 2,
            SetupPhase::AwaitingHandshake => 3,
            SetupPhase::Resolved { .. } => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SetupPhase::Resolved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Pending,
    Succeeded,
    Failed(SetupError),
}

impl SetupOutcome {
    pub fn indicator(&self) -> &'static str {
        match self {
            SetupOutcome::Pending => "…",
            SetupOutcome::Succeeded => "✓",
            SetupOutcome::Failed(_) => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SetupOutcome::Succeeded)
    }
}

/// Progress checkpoints reported to the host, in the only order they may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressMilestone {
    InstallingPackages,
    UpdatingConfiguration,
    CallingDevbox,
    Finished,
}

impl ProgressMilestone {
    pub fn message(self) -> &'static str {
        match self {
            ProgressMilestone::InstallingPackages => "Installing devbox packages...",
            ProgressMilestone::UpdatingConfiguration => "Updating configurations...",
            ProgressMilestone::CallingDevbox => "Calling Devbox to setup environment...",
            ProgressMilestone::Finished => "Finished setting up! Reloading the window...",
        }
    }

    pub fn percent(self) -> u8 {
        match self {
            ProgressMilestone::InstallingPackages => 25,
            ProgressMilestone::UpdatingConfiguration => 50,
            ProgressMilestone::CallingDevbox => 80,
            ProgressMilestone::Finished => 100,
        }
    }
}

/// One run of the setup workflow against a workspace directory.
///
/// Owned by the orchestrator for the duration of a run. Once the outcome is
/// resolved it never changes again.
#[derive(Debug, Clone)]
pub struct SetupSession {
    pub id: Uuid,
    working_dir: PathBuf,
    manifest_dir: PathBuf,
    phase: SetupPhase,
    outcome: SetupOutcome,
    cancellation_requested: bool,
    last_milestone: Option<ProgressMilestone>,
    manifest_status: Option<ManifestStatus>,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SetupSession {
    pub fn new(working_dir: impl Into<PathBuf>, manifest_dir_name: &str) -> Self {
        let working_dir = working_dir.into();
        let manifest_dir = working_dir.join(manifest_dir_name);

        Self {
            id: Uuid::new_v4(),
            working_dir,
            manifest_dir,
            phase: SetupPhase::NotStarted,
            outcome: SetupOutcome::Pending,
            cancellation_requested: false,
            last_milestone: None,
            manifest_status: None,
            started_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    pub fn phase(&self) -> SetupPhase {
        self.phase
    }

    pub fn outcome(&self) -> &SetupOutcome {
        &self.outcome
    }

    pub fn cancellation_requested(&self) -> bool {
        self.cancellation_requested
    }

    pub fn last_milestone(&self) -> Option<ProgressMilestone> {
        self.last_milestone
    }

    pub fn manifest_status(&self) -> Option<&ManifestStatus> {
        self.manifest_status.as_ref()
    }

    pub fn record_manifest_status(&mut self, status: ManifestStatus) {
        self.manifest_status = Some(status);
    }

    pub fn request_cancellation(&mut self) {
        self.cancellation_requested = true;
    }

    /// Move forward to `next`. Backward moves and moves out of a terminal
    /// phase are refused.
    pub fn advance(&mut self, next: SetupPhase) -> bool {
        if self.phase.is_terminal() || next.is_terminal() || next.rank() <= self.phase.rank() {
            return false;
        }
        debug!("Session {} phase {:?} -> {:?}", self.id, self.phase, next);
        self.phase = next;
        true
    }

    /// Accept a milestone only if it is strictly past the last one reported
    /// and the session is still live.
    pub fn try_milestone(&mut self, milestone: ProgressMilestone) -> bool {
        if self.cancellation_requested || self.phase.is_terminal() {
            return false;
        }
        if self.last_milestone.is_some_and(|last| milestone <= last) {
            return false;
        }
        self.last_milestone = Some(milestone);
        true
    }

    /// Settle the outcome. Only the first call wins.
    pub fn resolve(&mut self, outcome: SetupOutcome) -> bool {
        if self.phase.is_terminal() || outcome == SetupOutcome::Pending {
            return false;
        }
        self.phase = SetupPhase::Resolved {
            success: outcome.is_success(),
        };
        self.outcome = outcome;
        self.resolved_at = Some(Utc::now());
        true
    }
}
