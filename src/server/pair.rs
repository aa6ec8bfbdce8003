// src/server/pair.rs

use std::future::Future;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::{DevloopError, Result};

/// Run the control server and the application loop side by side.
///
/// When either task finishes, `token` is cancelled so the other one unwinds.
/// Both are awaited; the first error is returned.
pub async fn run_pair<C, A>(token: CancellationToken, control: C, app: A) -> Result<()>
where
    C: Future<Output = Result<()>> + Send + 'static,
    A: Future<Output = Result<()>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    tasks.spawn(async move { ("control", control.await) });
    tasks.spawn(async move { ("app", app.await) });

    let mut first_err: Option<DevloopError> = None;
    while let Some(joined) = tasks.join_next().await {
        let (name, result) = match joined {
            Ok(done) => done,
            Err(e) => ("task", Err(DevloopError::Other(anyhow!("task failed to complete: {e}")))),
        };

        match result {
            Ok(()) => debug!(task = name, "task finished"),
            Err(e) if first_err.is_none() => {
                error!(task = name, error = %e, "task failed; shutting down");
                first_err = Some(e);
            }
            Err(e) => debug!(task = name, error = %e, "task failed after shutdown began"),
        }
        token.cancel();
    }

    info!("dev server stopped");
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
