// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ProcessBackend` trait and the
//!   `tokio::process` implementation used in production.
//! - [`supervisor`] owns the start / close / restart state machine.
//! - [`shutdown`] stops a child with SIGTERM, escalating to SIGKILL.
//! - [`build`] compiles entrypoints through a configurable shell command.

pub mod backend;
pub mod build;
pub mod shutdown;
pub mod supervisor;

pub use backend::{spawn_command, LaunchSpec, ProcessBackend, RealProcessBackend, RunningProcess};
pub use build::{Builder, CommandBuilder};
pub use shutdown::shutdown_child;
pub use supervisor::{ProcessHandle, ProcessState, Supervisor, SupervisorOptions, CONTROL_ADDR_ENV};
