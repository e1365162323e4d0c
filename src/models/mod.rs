// ABOUTME: Core data models for a single environment setup run and its progress milestones

pub mod session;

pub use session::{ProgressMilestone, SetupOutcome, SetupPhase, SetupSession};
