// src/vfs/context.rs

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::types::BoxFuture;
use crate::vfs::mount::MountSource;

/// Async cleanup registered with [`VirtualFileSystem::defer`](crate::vfs::VirtualFileSystem::defer).
pub type Cleanup = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Wrap an async closure as a [`Cleanup`].
pub fn cleanup<F, Fut>(f: F) -> Cleanup
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Produces the contents of one generated file.
pub trait Generator: Send {
    fn generate<'a>(&'a mut self, cx: &'a mut GenerateContext) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// What a generator can see and request while it runs.
///
/// Mounts and cleanups requested here are applied to the filesystem after
/// the generator returns, whether it succeeded or not.
pub struct GenerateContext {
    root: PathBuf,
    path: String,
    token: CancellationToken,
    pub(crate) mounts: Vec<(String, Arc<dyn MountSource>)>,
    pub(crate) cleanups: Vec<Cleanup>,
}

impl fmt::Debug for GenerateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateContext")
            .field("root", &self.root)
            .field("path", &self.path)
            .field("mounts", &self.mounts.len())
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}

impl GenerateContext {
    pub fn new(root: impl Into<PathBuf>, path: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            root: root.into(),
            path: path.into(),
            token,
            mounts: Vec::new(),
            cleanups: Vec::new(),
        }
    }

    /// Directory generated files are written under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output path of the generator being run.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cancelled when the filesystem is closed.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn mount(&mut self, prefix: impl Into<String>, source: Arc<dyn MountSource>) {
        self.mounts.push((prefix.into(), source));
    }

    pub fn defer(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    pub fn requested_mounts(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|(prefix, _)| prefix.as_str())
    }

    pub fn requested_cleanups(&self) -> usize {
        self.cleanups.len()
    }
}
