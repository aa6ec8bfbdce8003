// src/handoff/mod.rs

//! Listener handoff: one socket, bound once, inherited by every app process.
//!
//! The socket stays open in this process for the whole session, so the OS
//! keeps queueing connections while one app process exits and the next one
//! starts. Clients connecting during a restart wait instead of being refused.
//!
//! Only app launches inherit it: the descriptor is close-on-exec here and is
//! made inheritable in the app child alone (see [`crate::exec::LaunchSpec`]).

mod inherit;
pub mod listen;

use std::io;
use std::net::{SocketAddr, TcpListener};

use tracing::debug;

use crate::errors::{DevloopError, Result};

pub use listen::{listen, listen_up};

#[cfg(unix)]
pub(crate) use inherit::keep_across_exec;

/// Environment variable that tells a child which inherited handle is the
/// listener called `name`.
pub fn env_key(name: &str) -> String {
    format!("DEVLOOP_{}_FD", name.to_uppercase())
}

/// A bound listener that app processes inherit.
#[derive(Debug)]
pub struct ListenerHandoff {
    name: String,
    addr: SocketAddr,
    handle: i32,
    listener: TcpListener,
}

impl ListenerHandoff {
    /// Bind `addr` (moving up on conflicts, see [`listen_up`]) and prepare
    /// the socket for handoff.
    pub fn bind(addr: &str, attempts: u16, name: &str) -> Result<Self> {
        let listener = listen_up(addr, attempts)?;
        Self::new(listener, name)
    }

    /// Take ownership of an already bound listener.
    pub fn new(listener: TcpListener, name: &str) -> Result<Self> {
        let addr = listener
            .local_addr()
            .map_err(|e| DevloopError::Handoff(format!("reading listener address: {e}")))?;
        let handle = inherit::handoff_handle(&listener)?;
        debug!(%addr, name, handle = %handle, "listener ready for handoff");

        Ok(Self {
            name: name.to_string(),
            addr,
            handle,
            listener,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the listener is bound to. Never changes across restarts.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Environment marker to attach to every app launch.
    pub fn env(&self) -> (String, String) {
        (env_key(&self.name), self.handle.to_string())
    }

    /// Descriptor number the app child inherits the listener under.
    pub fn handle(&self) -> i32 {
        self.handle
    }

    pub fn listener(&self) -> &TcpListener {
        &self.listener
    }
}

/// Child side: reconstruct the listener handed down under `name`.
///
/// Returns `Ok(None)` when this process was not started with a handoff.
pub fn inherited_listener(name: &str) -> io::Result<Option<TcpListener>> {
    match std::env::var(env_key(name)) {
        Ok(value) => inherit::listener_from_handle(&value).map(Some),
        Err(_) => Ok(None),
    }
}
