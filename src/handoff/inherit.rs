// src/handoff/inherit.rs

//! OS-specific handle passing for listener handoff.
//!
//! The listener keeps its close-on-exec flag in this process, so builds and
//! helper processes never see it. Only launches that ask for the descriptor
//! get an inheritable copy, made in the forked child right before exec.

use std::io;
use std::net::TcpListener;

use crate::errors::{DevloopError, Result};

/// Descriptor number of `listener`, with close-on-exec set on it.
#[cfg(unix)]
pub(crate) fn handoff_handle(listener: &TcpListener) -> Result<i32> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use std::os::fd::AsRawFd;

    let fd = listener.as_raw_fd();
    let bits = fcntl(fd, FcntlArg::F_GETFD)
        .map_err(|e| DevloopError::Handoff(format!("reading flags of fd {fd}: {e}")))?;

    let mut flags = FdFlag::from_bits_truncate(bits);
    if !flags.contains(FdFlag::FD_CLOEXEC) {
        flags.insert(FdFlag::FD_CLOEXEC);
        fcntl(fd, FcntlArg::F_SETFD(flags))
            .map_err(|e| DevloopError::Handoff(format!("setting close-on-exec on fd {fd}: {e}")))?;
    }

    Ok(fd)
}

#[cfg(not(unix))]
pub(crate) fn handoff_handle(_listener: &TcpListener) -> Result<i32> {
    Err(DevloopError::Handoff(
        "listener handoff is only supported on unix platforms".to_string(),
    ))
}

/// Clear close-on-exec on `fds` in the current process.
///
/// Runs between fork and exec, where only async-signal-safe calls are
/// allowed; `fcntl` is one. Descriptor flags belong to the child's own
/// table after the fork, so the parent's copies stay close-on-exec.
#[cfg(unix)]
pub(crate) fn keep_across_exec(fds: &[i32]) -> io::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};

    for &fd in fds {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map_err(io::Error::from)?;
    }
    Ok(())
}

/// Rebuild a listener from an inherited handle value.
#[cfg(unix)]
pub(crate) fn listener_from_handle(value: &str) -> io::Result<TcpListener> {
    use nix::fcntl::{fcntl, FcntlArg};
    use std::os::fd::{FromRawFd, RawFd};

    let fd: RawFd = value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid inherited fd {value:?}"),
        )
    })?;

    // Fails with EBADF if the descriptor was not actually inherited.
    fcntl(fd, FcntlArg::F_GETFD).map_err(io::Error::from)?;

    // SAFETY: the descriptor is open (checked above) and was handed to this
    // process for the sole purpose of being owned by this listener.
    let listener = unsafe { TcpListener::from_raw_fd(fd) };
    Ok(listener)
}

#[cfg(not(unix))]
pub(crate) fn listener_from_handle(_value: &str) -> io::Result<TcpListener> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "listener handoff is only supported on unix platforms",
    ))
}
