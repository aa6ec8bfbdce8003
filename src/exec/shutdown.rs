// src/exec/shutdown.rs

//! Graceful shutdown for `tokio::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Stop a child process and reap it.
///
/// 1. Unix: send SIGTERM and wait up to `grace` for it to exit.
/// 2. If it is still running (or on Windows), kill it.
/// 3. Wait for the exit status so no zombie is left behind.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if let Some(status) = terminate_unix(child, grace).await? {
            return Ok(status);
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

/// Returns `Some(status)` if the child exited within the grace period.
#[cfg(unix)]
async fn terminate_unix(child: &mut Child, grace: Duration) -> io::Result<Option<ExitStatus>> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return child.wait().await.map(Some);
    };

    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await.map(Some);
        }
        return Err(io::Error::other(e));
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            debug!(pid, "child exited after SIGTERM");
            status.map(Some)
        }
        Err(_) => {
            warn!(pid, grace_ms = grace.as_millis() as u64, "child ignored SIGTERM; killing");
            Ok(None)
        }
    }
}
