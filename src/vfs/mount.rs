// src/vfs/mount.rs

use crate::errors::Result;
use crate::types::BoxFuture;

/// A tree of files served by someone else, mounted under a prefix.
///
/// Paths are relative to the mount point and use forward slashes.
pub trait MountSource: Send + Sync {
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>>;
    fn read<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}
