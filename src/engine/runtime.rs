// src/engine/runtime.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Message};
use crate::errors::{DevloopError, Result};
use crate::exec::{Builder, ProcessBackend, ProcessHandle, ProcessState, Supervisor};
use crate::types::{ChangeBatch, ReloadDecision};
use crate::vfs::VirtualFileSystem;
use crate::watch::{BatchSource, ReloadClassifier};

use super::core::{effective_decision, initial_plan, plan, CycleOutcome, ReloadStep, Stage};

/// Entrypoint source and binary of the application, relative to the VFS
/// root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub entrypoint: PathBuf,
    pub binary: PathBuf,
}

impl Default for Artifacts {
    fn default() -> Self {
        Self {
            entrypoint: PathBuf::from(".devloop/app/main.go"),
            binary: PathBuf::from(".devloop/app/app"),
        }
    }
}

/// Drives reload cycles: consumes change batches, executes the steps
/// returned by [`plan`] and publishes lifecycle events on the bus.
///
/// Cycles are strictly serial. Non-fatal failures become
/// [`CycleOutcome::Failed`]; fatal ones end [`run`](Self::run).
pub struct Orchestrator<P: ProcessBackend> {
    vfs: VirtualFileSystem,
    builder: Arc<dyn Builder>,
    supervisor: Supervisor<P>,
    bus: EventBus,
    classifier: ReloadClassifier,
    artifacts: Artifacts,
    current: Option<ProcessHandle>,
}

impl<P: ProcessBackend> fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("vfs", &self.vfs)
            .field("artifacts", &self.artifacts)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<P: ProcessBackend> Orchestrator<P> {
    pub fn new(
        vfs: VirtualFileSystem,
        builder: Arc<dyn Builder>,
        supervisor: Supervisor<P>,
        bus: EventBus,
    ) -> Self {
        Self {
            vfs,
            builder,
            supervisor,
            bus,
            classifier: ReloadClassifier::default(),
            artifacts: Artifacts::default(),
            current: None,
        }
    }

    pub fn with_classifier(mut self, classifier: ReloadClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_artifacts(mut self, artifacts: Artifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn vfs(&self) -> &VirtualFileSystem {
        &self.vfs
    }

    pub fn supervisor(&self) -> &Supervisor<P> {
        &self.supervisor
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn current(&self) -> Option<&ProcessHandle> {
        self.current.as_ref()
    }

    /// State of the current application process, `Stopped` if there is none.
    pub fn current_state(&self) -> ProcessState {
        self.current
            .as_ref()
            .map_or(ProcessState::Stopped, ProcessHandle::state)
    }

    fn has_process(&self) -> bool {
        self.current_state() == ProcessState::Running
    }

    /// Sync, build and start for the first time.
    ///
    /// A failure is reported on the bus and the session keeps watching.
    pub async fn initial_cycle(&mut self) -> Result<CycleOutcome> {
        info!("initial build");
        self.execute(initial_plan(), ReloadDecision::Full).await
    }

    /// React to one batch of changes.
    pub async fn handle_batch(&mut self, batch: ChangeBatch) -> Result<CycleOutcome> {
        self.vfs.change(&batch.paths());

        let has_process = self.has_process();
        let classified = self.classifier.classify(&batch);
        let decision = effective_decision(classified, has_process);
        info!(
            changes = batch.len(),
            ?classified,
            ?decision,
            has_process,
            "reloading"
        );

        self.execute(plan(classified, has_process), decision).await
    }

    async fn execute(&mut self, steps: Vec<ReloadStep>, decision: ReloadDecision) -> Result<CycleOutcome> {
        for step in steps {
            debug!(?step, "reload step");
            match step {
                ReloadStep::Publish(message) => self.bus.publish(message),
                ReloadStep::CloseProcess => {
                    if let Some(handle) = self.current.as_mut() {
                        if let Err(e) = self.supervisor.close(handle).await {
                            return self.fail(Stage::Close, e);
                        }
                    }
                }
                ReloadStep::Sync => {
                    if let Err(e) = self.vfs.sync().await {
                        return self.fail(Stage::Sync, e);
                    }
                }
                ReloadStep::Build => {
                    let Artifacts { entrypoint, binary } = &self.artifacts;
                    if let Err(e) = self.builder.build(entrypoint, binary).await {
                        return self.fail(Stage::Build, e);
                    }
                }
                ReloadStep::StartProcess => {
                    let binary = self.vfs.root().join(&self.artifacts.binary);
                    self.current = None;
                    match self.supervisor.start(&binary).await {
                        Ok(handle) => self.current = Some(handle),
                        Err(e) => return self.fail(Stage::Start, e),
                    }
                }
                ReloadStep::RestartProcess => {
                    let result = match self.current.take() {
                        Some(handle) => self.supervisor.restart(handle).await,
                        None => {
                            let binary = self.vfs.root().join(&self.artifacts.binary);
                            self.supervisor.start(&binary).await
                        }
                    };
                    match result {
                        Ok(handle) => self.current = Some(handle),
                        Err(e) => return self.fail(Stage::Restart, e),
                    }
                }
            }
        }

        Ok(CycleOutcome::Reloaded(decision))
    }

    fn fail(&self, stage: Stage, err: DevloopError) -> Result<CycleOutcome> {
        if err.is_fatal() {
            return Err(err);
        }
        let message = err.to_string();
        warn!(%stage, error = %message, "reload failed");
        self.bus.publish(Message::app_error(message.clone()));
        Ok(CycleOutcome::Failed { stage, message })
    }

    /// Run until the batch source ends, `token` is cancelled, or a fatal
    /// error occurs. The application process and then the VFS are closed on
    /// the way out, whatever the reason.
    pub async fn run<S: BatchSource>(mut self, mut source: S, token: CancellationToken) -> Result<()> {
        let result = self.drive(&mut source, &token).await;
        if let Err(e) = &result {
            warn!(error = %e, "orchestrator stopping");
        }
        let closed = self.shutdown().await;
        result.and(closed)
    }

    async fn drive<S: BatchSource>(&mut self, source: &mut S, token: &CancellationToken) -> Result<()> {
        let outcome = self.initial_cycle().await?;
        debug!(?outcome, "initial cycle finished");

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    info!("shutdown requested");
                    return Ok(());
                }
                next = source.next_batch() => next?,
            };

            let Some(batch) = next else {
                info!("change source closed");
                return Ok(());
            };

            let outcome = self.handle_batch(batch).await?;
            debug!(?outcome, "cycle finished");
        }
    }

    /// Close the application process, then the VFS. The first error wins but
    /// both are always attempted.
    pub async fn shutdown(&mut self) -> Result<()> {
        let process = match self.current.as_mut() {
            Some(handle) => self.supervisor.close(handle).await,
            None => Ok(()),
        };
        let vfs = self.vfs.close().await;
        process.and(vfs)
    }
}
