// src/vfs/mod.rs

//! Virtual filesystem of generated artifacts.
//!
//! Files come from two places:
//!
//! - local generators registered with [`VirtualFileSystem::generate`], each
//!   re-run only after one of its input globs was touched;
//! - mounted subtrees ([`MountSource`]), re-read on every sync and mirrored
//!   under `root/prefix/`.
//!
//! Everything is written through the [`FileSystem`] abstraction, so tests
//! run against [`MockFileSystem`](crate::fs::mock::MockFileSystem).

pub mod context;
pub mod mount;
pub mod source;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use globset::GlobSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{DevloopError, Result};
use crate::fs::{is_contained, FileSystem};
use crate::watch::patterns::compile_globset;

pub use context::{cleanup, Cleanup, GenerateContext, Generator};
pub use mount::MountSource;
pub use source::{SourceGenerator, SourceRenderer, TemplateFile};

/// Where a file in the virtual filesystem came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    LocalGenerator,
    RemoteSubtree { prefix: String },
}

/// A generated file and its last contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub path: String,
    pub data: Vec<u8>,
    pub origin: Origin,
}

struct GeneratorEntry {
    inputs: GlobSet,
    generator: Box<dyn Generator>,
    fresh: bool,
}

struct MountEntry {
    source: Arc<dyn MountSource>,
    served: BTreeSet<String>,
}

pub struct VirtualFileSystem {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    token: CancellationToken,
    generators: BTreeMap<String, GeneratorEntry>,
    mounts: BTreeMap<String, MountEntry>,
    cache: BTreeMap<String, VirtualFile>,
    cleanups: Vec<Cleanup>,
    closed: bool,
}

impl fmt::Debug for VirtualFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFileSystem")
            .field("root", &self.root)
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .field("mounts", &self.mounts.keys().collect::<Vec<_>>())
            .field("files", &self.cache.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl VirtualFileSystem {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            token: CancellationToken::new(),
            generators: BTreeMap::new(),
            mounts: BTreeMap::new(),
            cache: BTreeMap::new(),
            cleanups: Vec::new(),
            closed: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register `generator` as the producer of `path`.
    ///
    /// `inputs` are globs over source paths; a change to any matching path
    /// makes the generator run again on the next [`sync`](Self::sync).
    pub fn generate<G>(&mut self, path: impl Into<String>, inputs: &[String], generator: G) -> Result<()>
    where
        G: Generator + 'static,
    {
        let path = path.into();
        let inputs = compile_globset(inputs).map_err(|e| DevloopError::Generation {
            path: path.clone(),
            message: format!("invalid input glob: {e}"),
        })?;

        debug!(path = %path, "generator registered");
        self.generators.insert(
            path,
            GeneratorEntry {
                inputs,
                generator: Box::new(generator),
                fresh: false,
            },
        );
        Ok(())
    }

    /// Mount `source` under `prefix`, replacing any earlier mount there.
    pub fn mount(&mut self, prefix: impl Into<String>, source: Arc<dyn MountSource>) {
        let prefix = normalize_prefix(&prefix.into());
        let served = self
            .mounts
            .remove(&prefix)
            .map(|old| old.served)
            .unwrap_or_default();
        debug!(prefix = %prefix, "mounted subtree");
        self.mounts.insert(prefix, MountEntry { source, served });
    }

    /// Register a cleanup to run on [`close`](Self::close).
    pub fn defer(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    /// Bring every generated file up to date.
    pub async fn sync(&mut self) -> Result<()> {
        let stale: Vec<String> = self
            .generators
            .iter()
            .filter(|(_, entry)| !entry.fresh)
            .map(|(path, _)| path.clone())
            .collect();

        for path in stale {
            self.run_generator(&path).await?;
        }

        let mounts: Vec<(String, Arc<dyn MountSource>)> = self
            .mounts
            .iter()
            .map(|(prefix, entry)| (prefix.clone(), Arc::clone(&entry.source)))
            .collect();

        for (prefix, source) in mounts {
            self.refresh_mount(&prefix, source.as_ref())
                .await
                .map_err(|e| DevloopError::Generation {
                    path: prefix.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(())
    }

    async fn run_generator(&mut self, path: &str) -> Result<()> {
        let Some(entry) = self.generators.get_mut(path) else {
            return Ok(());
        };

        let mut cx = GenerateContext::new(&self.root, path, self.token.child_token());
        let result = entry.generator.generate(&mut cx).await;

        for (prefix, source) in cx.mounts.drain(..) {
            self.mount(prefix, source);
        }
        self.cleanups.append(&mut cx.cleanups);

        let data = result.map_err(|e| match e {
            DevloopError::Generation { .. }
            | DevloopError::Build { .. }
            | DevloopError::Spawn { .. }
            | DevloopError::Lifecycle(_) => e,
            other => DevloopError::Generation {
                path: path.to_string(),
                message: other.to_string(),
            },
        })?;

        self.fs
            .write(&self.root.join(path), &data)
            .map_err(|e| DevloopError::Generation {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        info!(path = %path, bytes = data.len(), "generated");
        self.cache.insert(
            path.to_string(),
            VirtualFile {
                path: path.to_string(),
                data,
                origin: Origin::LocalGenerator,
            },
        );
        if let Some(entry) = self.generators.get_mut(path) {
            entry.fresh = true;
        }
        Ok(())
    }

    async fn refresh_mount(&mut self, prefix: &str, source: &dyn MountSource) -> Result<()> {
        let listed = source.list().await?;
        if let Some(bad) = listed.iter().find(|rel| !is_contained(Path::new(rel))) {
            return Err(anyhow!("listed path {bad:?} is outside the mount").into());
        }
        let mut served = BTreeSet::new();

        for rel in listed {
            let data = source.read(&rel).await?;
            let path = format!("{prefix}/{rel}");
            self.fs.write(&self.root.join(&path), &data)?;
            self.cache.insert(
                path.clone(),
                VirtualFile {
                    path,
                    data,
                    origin: Origin::RemoteSubtree {
                        prefix: prefix.to_string(),
                    },
                },
            );
            served.insert(rel);
        }

        let previous = self
            .mounts
            .get_mut(prefix)
            .map(|entry| std::mem::replace(&mut entry.served, served.clone()))
            .unwrap_or_default();

        for gone in previous.difference(&served) {
            let path = format!("{prefix}/{gone}");
            self.fs.remove_file(&self.root.join(&path))?;
            self.cache.remove(&path);
            debug!(path = %path, "removed file no longer served");
        }

        debug!(prefix = %prefix, files = served.len(), "mount refreshed");
        Ok(())
    }

    /// Record that `paths` changed on disk.
    ///
    /// Drops cached entries for exactly those paths and marks stale every
    /// generator that depends on one of them or produces one of them.
    pub fn change<S: AsRef<str>>(&mut self, paths: &[S]) {
        for path in paths {
            let path = path.as_ref();
            self.cache.remove(path);
            for (output, entry) in self.generators.iter_mut() {
                if output == path || entry.inputs.is_match(path) {
                    if entry.fresh {
                        debug!(generator = %output, changed = %path, "generator invalidated");
                    }
                    entry.fresh = false;
                }
            }
        }
    }

    pub fn file(&self, path: &str) -> Option<&VirtualFile> {
        self.cache.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &VirtualFile> {
        self.cache.values()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run every deferred cleanup once, in registration order.
    ///
    /// All cleanups run even if some fail; the first error is returned.
    /// Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.token.cancel();

        let mut first_err = None;
        for cleanup in self.cleanups.drain(..) {
            if let Err(e) = cleanup().await {
                warn!(error = %e, "cleanup failed");
                first_err.get_or_insert(e);
            }
        }
        self.mounts.clear();

        debug!(root = %self.root.display(), "virtual filesystem closed");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for VirtualFileSystem {
    fn drop(&mut self) {
        if !self.closed && !self.cleanups.is_empty() {
            warn!(
                pending = self.cleanups.len(),
                "virtual filesystem dropped without close; cleanups skipped"
            );
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}
