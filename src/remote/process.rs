// src/remote/process.rs

//! Launching a generator binary that serves its tree back over a socket.
//!
//! The parent binds an ephemeral loopback listener, passes its address in
//! [`REMOTEFS_ADDR_ENV`] and waits for the child to connect. Only a child
//! that completed this handshake is ever mounted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::errors::{DevloopError, Result};
use crate::exec::backend::{spawn_command, LaunchSpec};
use crate::exec::shutdown::shutdown_child;
use crate::remote::client::RemoteClient;
use crate::types::BoxFuture;
use crate::vfs::MountSource;

/// Address the child must connect back to.
pub const REMOTEFS_ADDR_ENV: &str = "DEVLOOP_REMOTEFS_ADDR";

/// A running child serving a mountable tree.
pub trait MountedProcess: Send {
    fn source(&self) -> Arc<dyn MountSource>;
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Starts [`MountedProcess`]es from a built binary.
pub trait MountLauncher: Send {
    fn launch<'a>(&'a mut self, binary: &'a Path) -> BoxFuture<'a, Result<Box<dyn MountedProcess>>>;
}

/// Launches real child processes and performs the connect-back handshake.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    dir: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    connect_timeout: Duration,
    shutdown_timeout: Duration,
}

impl RemoteCommand {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            connect_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    async fn start(&self, binary: &Path) -> Result<Box<dyn MountedProcess>> {
        let program = binary.display().to_string();
        let spawn_err = |message: String| DevloopError::Spawn {
            program: program.clone(),
            message,
        };

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| spawn_err(format!("binding handshake listener: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| spawn_err(format!("reading handshake address: {e}")))?;

        let mut spec = LaunchSpec::new(binary, &self.dir).env(REMOTEFS_ADDR_ENV, addr.to_string());
        spec.args.extend(self.args.iter().cloned());
        spec.env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut child = spawn_command(&spec)?;
        debug!(program = %program, pid = ?child.id(), %addr, "waiting for generator to connect");

        let handshake = tokio::select! {
            accepted = tokio::time::timeout(self.connect_timeout, listener.accept()) => match accepted {
                Ok(Ok((stream, _))) => RemoteClient::new(stream)
                    .map_err(|e| format!("handshake: {e}")),
                Ok(Err(e)) => Err(format!("accepting connection: {e}")),
                Err(_) => Err(format!(
                    "did not connect within {} ms",
                    self.connect_timeout.as_millis()
                )),
            },
            status = child.wait() => Err(match status {
                Ok(status) => format!("exited before connecting ({status})"),
                Err(e) => format!("lost child before connecting: {e}"),
            }),
        };

        match handshake {
            Ok(client) => {
                info!(program = %program, pid = ?child.id(), "generator connected");
                Ok(Box::new(RemoteProcess {
                    program,
                    client: Arc::new(client),
                    child,
                    grace: self.shutdown_timeout,
                }))
            }
            Err(message) => {
                if let Err(e) = shutdown_child(&mut child, self.shutdown_timeout).await {
                    warn!(program = %program, error = %e, "failed to stop generator after handshake failure");
                }
                Err(spawn_err(message))
            }
        }
    }
}

impl MountLauncher for RemoteCommand {
    fn launch<'a>(&'a mut self, binary: &'a Path) -> BoxFuture<'a, Result<Box<dyn MountedProcess>>> {
        Box::pin(self.start(binary))
    }
}

/// A generator child connected over loopback.
pub struct RemoteProcess {
    program: String,
    client: Arc<RemoteClient>,
    child: Child,
    grace: Duration,
}

impl MountedProcess for RemoteProcess {
    fn source(&self) -> Arc<dyn MountSource> {
        self.client.clone()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let status = shutdown_child(&mut self.child, self.grace)
                .await
                .map_err(|e| DevloopError::Lifecycle(format!("stopping {}: {e}", self.program)))?;
            debug!(program = %self.program, %status, "generator exited");
            Ok(())
        })
    }
}
