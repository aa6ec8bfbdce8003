// src/remote/mod.rs

//! Remote mounts: a subtree of the virtual filesystem served by a helper
//! process over a loopback socket.
//!
//! - [`generator`]: `RemoteMountGenerator`, which builds and (re)launches
//!   the helper as part of a VFS sync.
//! - [`process`]: the launcher and the connect-back handshake.
//! - [`client`] / [`serve`]: the two ends of the connection.
//! - [`protocol`]: the frame format.

pub mod client;
pub mod generator;
pub mod process;
pub mod protocol;
pub mod serve;

pub use client::RemoteClient;
pub use generator::RemoteMountGenerator;
pub use process::{MountLauncher, MountedProcess, RemoteCommand, RemoteProcess, REMOTEFS_ADDR_ENV};
pub use serve::{serve_connection, serve_from_env, DirSource};
