// src/handoff/listen.rs

use std::io;
use std::net::TcpListener;

use tracing::{debug, info};

use crate::errors::{DevloopError, Result};

/// Bind `addr`, moving up one port at a time while the port is taken.
///
/// - `addr` is `host:port`; an empty host (`":3000"`) means all interfaces.
/// - At most `attempts` ports are tried (`port`, `port + 1`, ...).
/// - Port 0 asks the OS for a free port and is tried exactly once.
/// - Errors other than "address in use" are returned immediately.
pub fn listen_up(addr: &str, attempts: u16) -> Result<TcpListener> {
    let (host, port) = split_host_port(addr)?;
    let attempts = if port == 0 { 1 } else { attempts.max(1) };

    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host.as_str(), candidate)) {
            Ok(listener) => {
                if offset > 0 {
                    info!(requested = port, bound = candidate, "requested port in use; moved up");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!(host = %host, port = candidate, "port in use, trying next");
            }
            Err(e) => {
                return Err(DevloopError::Handoff(format!(
                    "binding {host}:{candidate}: {e}"
                )));
            }
        }
    }

    Err(DevloopError::Handoff(format!(
        "{addr}: no free port after {attempts} attempt(s) starting at {port}"
    )))
}

/// Bind exactly `addr`, without moving up.
pub fn listen(addr: &str) -> Result<TcpListener> {
    listen_up(addr, 1)
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| DevloopError::Handoff(format!("address {addr:?} is missing a port")))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { "0.0.0.0" } else { host };

    let port: u16 = port
        .parse()
        .map_err(|_| DevloopError::Handoff(format!("address {addr:?} has an invalid port")))?;

    Ok((host.to_string(), port))
}
