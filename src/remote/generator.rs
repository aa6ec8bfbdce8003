// src/remote/generator.rs

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::exec::build::Builder;
use crate::fs::FileSystem;
use crate::remote::process::{MountLauncher, MountedProcess};
use crate::types::BoxFuture;
use crate::vfs::{cleanup, GenerateContext, Generator, SourceRenderer};

type Slot = Arc<Mutex<Option<Box<dyn MountedProcess>>>>;

/// Generator that builds a helper binary, runs it and mounts the tree it
/// serves.
///
/// Each run renders and builds the helper, closes the previous instance and
/// only then launches the new one, so at most one helper is ever alive.
/// The generated file itself is the rendered helper source.
pub struct RemoteMountGenerator<L: MountLauncher> {
    renderer: Arc<dyn SourceRenderer>,
    builder: Arc<dyn Builder>,
    launcher: L,
    fs: Arc<dyn FileSystem>,
    entrypoint: PathBuf,
    binary: PathBuf,
    prefix: String,
    current: Slot,
    cleanup_registered: bool,
}

impl<L: MountLauncher> RemoteMountGenerator<L> {
    pub fn new(
        renderer: Arc<dyn SourceRenderer>,
        builder: Arc<dyn Builder>,
        launcher: L,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            renderer,
            builder,
            launcher,
            fs,
            entrypoint: PathBuf::from(".devloop/generator/main.go"),
            binary: PathBuf::from(".devloop/generator/generator"),
            prefix: ".devloop/generated".to_string(),
            current: Arc::new(Mutex::new(None)),
            cleanup_registered: false,
        }
    }

    /// Entrypoint source and binary paths, relative to the root.
    pub fn with_artifacts(mut self, entrypoint: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Self {
        self.entrypoint = entrypoint.into();
        self.binary = binary.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    async fn run(&mut self, cx: &mut GenerateContext) -> Result<Vec<u8>> {
        if !self.cleanup_registered {
            self.cleanup_registered = true;
            let current = Arc::clone(&self.current);
            cx.defer(cleanup(move || async move {
                match current.lock().await.take() {
                    Some(mut process) => process.close().await,
                    None => Ok(()),
                }
            }));
        }

        let source = self.renderer.render()?;
        let entry_path = cx.root().join(&self.entrypoint);
        self.fs
            .write(&entry_path, &source)
            .map_err(|e| DevloopError::Generation {
                path: self.entrypoint.display().to_string(),
                message: e.to_string(),
            })?;

        self.builder.build(&self.entrypoint, &self.binary).await?;

        let mut slot = self.current.lock().await;
        if let Some(mut previous) = slot.take() {
            debug!(prefix = %self.prefix, "closing previous generator");
            previous.close().await?;
        }

        let process = self.launcher.launch(&cx.root().join(&self.binary)).await?;
        cx.mount(self.prefix.clone(), process.source());
        *slot = Some(process);

        info!(prefix = %self.prefix, "generator mounted");
        Ok(source)
    }
}

impl<L: MountLauncher> Generator for RemoteMountGenerator<L> {
    fn generate<'a>(&'a mut self, cx: &'a mut GenerateContext) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(self.run(cx))
    }
}
