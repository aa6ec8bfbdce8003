// src/engine/core.rs

//! Pure reload planning.
//!
//! Given what changed and whether an application process is live, [`plan`]
//! returns the ordered steps of one reload cycle. The async shell
//! (`engine::runtime::Orchestrator`) executes them. Nothing here touches
//! Tokio, processes, or the filesystem, so the rules are unit testable.

use crate::bus::Message;
use crate::types::ReloadDecision;

/// One step of a reload cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadStep {
    Publish(Message),
    /// Stop the current process and wait for it to exit.
    CloseProcess,
    /// Regenerate stale artifacts.
    Sync,
    /// Compile the application entrypoint.
    Build,
    /// Launch the application when none is running.
    StartProcess,
    /// Launch the application again in place of the closed one.
    RestartProcess,
}

/// Cycle stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Close,
    Sync,
    Build,
    Start,
    Restart,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Close => "close",
            Stage::Sync => "sync",
            Stage::Build => "build",
            Stage::Start => "start",
            Stage::Restart => "restart",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one reload cycle that did not end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle completed. Carries the decision that was acted on.
    Reloaded(ReloadDecision),
    /// A stage failed; `app:error` was published and the process is stopped.
    Failed { stage: Stage, message: String },
}

/// Steps of the first cycle after startup.
pub fn initial_plan() -> Vec<ReloadStep> {
    vec![
        ReloadStep::Sync,
        ReloadStep::Build,
        ReloadStep::StartProcess,
        ReloadStep::Publish(Message::AppReady),
    ]
}

/// Decision actually acted on: without a live process everything is a full
/// reload.
pub fn effective_decision(decision: ReloadDecision, has_process: bool) -> ReloadDecision {
    if has_process {
        decision
    } else {
        ReloadDecision::Full
    }
}

/// Steps for a change batch classified as `decision`.
pub fn plan(decision: ReloadDecision, has_process: bool) -> Vec<ReloadStep> {
    match (effective_decision(decision, has_process), has_process) {
        (ReloadDecision::Incremental, _) => vec![
            ReloadStep::Publish(Message::FrontendUpdate),
            ReloadStep::Publish(Message::AppReady),
        ],
        (ReloadDecision::Full, true) => vec![
            ReloadStep::Publish(Message::BackendUpdate),
            ReloadStep::CloseProcess,
            ReloadStep::Sync,
            ReloadStep::Build,
            ReloadStep::RestartProcess,
            ReloadStep::Publish(Message::AppReady),
        ],
        (ReloadDecision::Full, false) => vec![
            ReloadStep::Publish(Message::BackendUpdate),
            ReloadStep::Sync,
            ReloadStep::Build,
            ReloadStep::StartProcess,
            ReloadStep::Publish(Message::AppReady),
        ],
    }
}
