// src/exec/supervisor.rs

//! Application process supervisor.
//!
//! Each managed process moves through
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`. The transitions
//! are tracked on the [`ProcessHandle`] itself, so tests can assert them
//! with a fake backend.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::exec::backend::{LaunchSpec, ProcessBackend, RunningProcess};
use crate::handoff::ListenerHandoff;

/// Lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ProcessState {
    fn can_move_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }
}

/// One launch of the application binary.
pub struct ProcessHandle {
    generation: u64,
    binary: PathBuf,
    state: ProcessState,
    history: Vec<ProcessState>,
    child: Option<Box<dyn RunningProcess>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("generation", &self.generation)
            .field("binary", &self.binary)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ProcessHandle {
    fn new(generation: u64, binary: PathBuf) -> Self {
        Self {
            generation,
            binary,
            state: ProcessState::Stopped,
            history: vec![ProcessState::Stopped],
            child: None,
        }
    }

    /// Increases by one for every launch made by the same supervisor.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Every state this handle has been in, oldest first.
    pub fn history(&self) -> &[ProcessState] {
        &self.history
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    fn transition(&mut self, next: ProcessState) -> Result<()> {
        if !self.state.can_move_to(next) {
            return Err(DevloopError::Lifecycle(format!(
                "illegal transition {:?} -> {:?} for process generation {}",
                self.state, next, self.generation
            )));
        }
        debug!(generation = self.generation, from = ?self.state, to = ?next, "process state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

/// How launched processes are configured.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Working directory of the application.
    pub dir: PathBuf,
    /// Arguments passed to the application binary.
    pub args: Vec<String>,
    /// Extra environment for the application.
    pub env: Vec<(String, String)>,
    /// Grace period before a stopping process is killed.
    pub shutdown_timeout: Duration,
}

impl SupervisorOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            args: Vec::new(),
            env: Vec::new(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Starts, stops and restarts the application through a [`ProcessBackend`].
pub struct Supervisor<P: ProcessBackend> {
    backend: P,
    options: SupervisorOptions,
    handoff: Option<Arc<ListenerHandoff>>,
    control_addr: Option<SocketAddr>,
    launches: u64,
}

/// Environment variable telling the application where the control server listens.
pub const CONTROL_ADDR_ENV: &str = "DEVLOOP_CONTROL_ADDR";

impl<P: ProcessBackend> fmt::Debug for Supervisor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("options", &self.options)
            .field("launches", &self.launches)
            .finish_non_exhaustive()
    }
}

impl<P: ProcessBackend> Supervisor<P> {
    pub fn new(backend: P, options: SupervisorOptions) -> Self {
        Self {
            backend,
            options,
            handoff: None,
            control_addr: None,
            launches: 0,
        }
    }

    /// Hand this listener to every process the supervisor launches.
    pub fn with_handoff(mut self, handoff: Arc<ListenerHandoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn with_control_addr(mut self, addr: SocketAddr) -> Self {
        self.control_addr = Some(addr);
        self
    }

    pub fn handoff(&self) -> Option<&Arc<ListenerHandoff>> {
        self.handoff.as_ref()
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    pub fn launch_spec(&self, binary: &Path) -> LaunchSpec {
        let mut spec = LaunchSpec::new(binary, &self.options.dir);
        spec.args.extend(self.options.args.iter().cloned());
        spec.env.extend(self.options.env.iter().cloned());
        if let Some(handoff) = &self.handoff {
            let (key, value) = handoff.env();
            spec.env.push((key, value));
            spec.inherit.push(handoff.handle());
        }
        if let Some(addr) = self.control_addr {
            spec.env.push((CONTROL_ADDR_ENV.to_string(), addr.to_string()));
        }
        spec
    }

    /// Launch `binary`. Fails with [`DevloopError::Spawn`] if it cannot start.
    pub async fn start(&mut self, binary: &Path) -> Result<ProcessHandle> {
        self.launches += 1;
        let mut handle = ProcessHandle::new(self.launches, binary.to_path_buf());
        handle.transition(ProcessState::Starting)?;

        let spec = self.launch_spec(binary);
        match self.backend.spawn(&spec).await {
            Ok(child) => {
                handle.child = Some(child);
                handle.transition(ProcessState::Running)?;
                info!(
                    generation = handle.generation,
                    binary = %binary.display(),
                    pid = ?handle.pid(),
                    "application running"
                );
                Ok(handle)
            }
            Err(err) => {
                handle.transition(ProcessState::Stopped)?;
                Err(err)
            }
        }
    }

    /// Stop the process and wait for it to exit. Closing a stopped handle is
    /// a no-op.
    pub async fn close(&mut self, handle: &mut ProcessHandle) -> Result<()> {
        if handle.state == ProcessState::Stopped {
            return Ok(());
        }

        handle.transition(ProcessState::Stopping)?;
        if let Some(mut child) = handle.child.take() {
            child.terminate(self.options.shutdown_timeout).await?;
        }
        handle.transition(ProcessState::Stopped)?;

        info!(generation = handle.generation, "application stopped");
        Ok(())
    }

    /// Close `handle` (if it is still live) and launch the same binary again.
    pub async fn restart(&mut self, mut handle: ProcessHandle) -> Result<ProcessHandle> {
        self.close(&mut handle).await?;
        self.start(&handle.binary).await
    }
}
