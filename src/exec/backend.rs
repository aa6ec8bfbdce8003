// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The supervisor talks to a `ProcessBackend` instead of `tokio::process`
//! directly, so tests can swap in a fake that records spawns and
//! terminations without touching the OS.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::exec::shutdown::shutdown_child;
use crate::types::BoxFuture;

/// Everything needed to launch one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub dir: PathBuf,
    pub env: Vec<(String, String)>,
    /// Descriptors the child keeps across exec under the same number.
    /// Everything else this process holds stays close-on-exec.
    pub inherit: Vec<i32>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.into(),
            env: Vec::new(),
            inherit: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up an environment entry set on this spec.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A launched process.
pub trait RunningProcess: Send {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Stop the process, escalating after `grace`, and wait until it is gone.
    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>>;
}

/// Trait abstracting how processes are launched.
///
/// Production code uses [`RealProcessBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessBackend: Send {
    fn spawn<'a>(&'a mut self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<Box<dyn RunningProcess>>>;
}

/// Backend that launches real OS processes with `tokio::process`.
///
/// Children inherit stdout/stderr so the application's output shows up in
/// the terminal, and are killed if their handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct RealProcessBackend;

impl RealProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for RealProcessBackend {
    fn spawn<'a>(&'a mut self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<Box<dyn RunningProcess>>> {
        Box::pin(async move {
            let child = spawn_command(spec)?;
            info!(program = %spec.program.display(), pid = ?child.id(), "process started");
            Ok(Box::new(RealProcess {
                program: spec.program.display().to_string(),
                child,
            }) as Box<dyn RunningProcess>)
        })
    }
}

/// Spawn `spec` as a `tokio::process::Child`.
pub fn spawn_command(spec: &LaunchSpec) -> Result<Child> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.dir)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    if !spec.inherit.is_empty() {
        let fds = spec.inherit.clone();
        // SAFETY: the hook only calls fcntl, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || crate::handoff::keep_across_exec(&fds));
        }
    }

    cmd.spawn().map_err(|e| DevloopError::Spawn {
        program: spec.program.display().to_string(),
        message: e.to_string(),
    })
}

struct RealProcess {
    program: String,
    child: Child,
}

impl RunningProcess for RealProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let status = shutdown_child(&mut self.child, grace).await.map_err(|e| {
                DevloopError::Lifecycle(format!("stopping {}: {e}", self.program))
            })?;
            debug!(program = %self.program, ?status, "process exited");
            Ok(())
        })
    }
}
