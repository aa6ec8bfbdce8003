// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::errors::{DevloopError, Result};
use crate::types::{BoxFuture, ChangeBatch, ChangeEvent, ChangeOp};
use crate::watch::debouncer::Debouncer;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::IgnoreSet;

/// Anything the orchestrator can pull change batches from.
///
/// `next_batch` resolves to `Ok(None)` when the source is exhausted. Batches
/// that piled up while the caller was busy are merged into one.
pub trait BatchSource: Send {
    fn next_batch(&mut self) -> BoxFuture<'_, Result<Option<ChangeBatch>>>;
}

/// Recursive filesystem watcher that emits debounced [`ChangeBatch`]es.
///
/// Dropping the watcher stops both the OS watch and the debounce task.
pub struct ChangeWatcher {
    root: PathBuf,
    batches: mpsc::UnboundedReceiver<Result<ChangeBatch>>,
    task: JoinHandle<()>,
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    /// Start watching `root` recursively.
    ///
    /// - `ignore` filters paths (relative to `root`) before debouncing.
    /// - `debounce` is the quiescence window after which a batch is emitted.
    pub fn spawn(root: impl Into<PathBuf>, ignore: IgnoreSet, debounce: Duration) -> Result<Self> {
        let root = root.into();
        // Canonicalize once so we have a stable base path.
        let root = root.canonicalize().unwrap_or_else(|_| root.clone());

        // Channel from the blocking notify callback into the async world.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away when the watcher is shutting down.
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| DevloopError::Watch(format!("creating watcher: {e}")))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| DevloopError::Watch(format!("watching {}: {e}", root.display())))?;

        info!("file watcher started on {:?}", root);

        let (batch_tx, batches) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(
            root.clone(),
            ignore,
            Debouncer::new(debounce),
            raw_rx,
            batch_tx,
        ));

        Ok(Self {
            root,
            batches,
            task,
            _inner: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for the next batch, merging any that queued up meanwhile.
    ///
    /// A watch failure is returned as [`DevloopError::Watch`] and is final.
    pub async fn next_batch(&mut self) -> Result<Option<ChangeBatch>> {
        let Some(first) = self.batches.recv().await else {
            return Ok(None);
        };
        let mut batch = first?;
        while let Ok(more) = self.batches.try_recv() {
            batch.merge(more?);
        }
        Ok(Some(batch))
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl BatchSource for ChangeWatcher {
    fn next_batch(&mut self) -> BoxFuture<'_, Result<Option<ChangeBatch>>> {
        Box::pin(ChangeWatcher::next_batch(self))
    }
}

/// Channel-backed source, used to drive the orchestrator from tests or from
/// another producer.
impl BatchSource for mpsc::Receiver<ChangeBatch> {
    fn next_batch(&mut self) -> BoxFuture<'_, Result<Option<ChangeBatch>>> {
        Box::pin(async move {
            let Some(mut batch) = self.recv().await else {
                return Ok(None);
            };
            while let Ok(more) = self.try_recv() {
                batch.merge(more);
            }
            Ok(Some(batch))
        })
    }
}

async fn debounce_loop(
    root: PathBuf,
    ignore: IgnoreSet,
    mut debouncer: Debouncer,
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    batch_tx: mpsc::UnboundedSender<Result<ChangeBatch>>,
) {
    loop {
        let deadline = debouncer.deadline();
        let sleep_until = tokio::time::Instant::from_std(
            deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
        );

        tokio::select! {
            raw = raw_rx.recv() => match raw {
                None => break,
                Some(Err(err)) => {
                    warn!(error = %err, "file watch error");
                    let _ = batch_tx.send(Err(DevloopError::Watch(err.to_string())));
                    break;
                }
                Some(Ok(event)) => {
                    trace!(?event, "received notify event");
                    let now = Instant::now();
                    for change in translate_event(&root, &ignore, event) {
                        debug!(path = %change.path, op = change.op.label(), "file changed");
                        debouncer.push(change, now);
                    }
                }
            },
            _ = tokio::time::sleep_until(sleep_until), if deadline.is_some() => {
                if let Some(batch) = debouncer.take_if_ready(Instant::now()) {
                    debug!(events = batch.len(), "emitting change batch");
                    if batch_tx.send(Ok(batch)).is_err() {
                        break;
                    }
                }
            }
        }
    }
    debug!("watcher event loop finished");
}

/// Map a raw notify event to zero or more relative, non-ignored changes.
pub fn translate_event(root: &Path, ignore: &IgnoreSet, event: Event) -> Vec<ChangeEvent> {
    let ops: Vec<(PathBuf, ChangeOp)> = match event.kind {
        EventKind::Create(_) => with_op(event.paths, ChangeOp::Create),
        EventKind::Remove(_) => with_op(event.paths, ChangeOp::Delete),
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => with_op(event.paths, ChangeOp::Delete),
            RenameMode::To => with_op(event.paths, ChangeOp::Create),
            RenameMode::Both => {
                let mut paths = event.paths.into_iter();
                let mut ops = Vec::new();
                if let Some(from) = paths.next() {
                    ops.push((from, ChangeOp::Delete));
                }
                ops.extend(paths.map(|to| (to, ChangeOp::Create)));
                ops
            }
            _ => event
                .paths
                .into_iter()
                .map(|p| {
                    let op = if p.exists() {
                        ChangeOp::Create
                    } else {
                        ChangeOp::Delete
                    };
                    (p, op)
                })
                .collect(),
        },
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            // Directory mtime bumps carry no content change of their own.
            event
                .paths
                .into_iter()
                .filter(|p| !p.is_dir())
                .map(|p| (p, ChangeOp::Update))
                .collect()
        }
    };

    ops.into_iter()
        .filter_map(|(path, op)| {
            let rel = relative_str(root, &path)?;
            if ignore.is_ignored(&rel) {
                trace!(path = %rel, "ignored change");
                return None;
            }
            Some(ChangeEvent::new(rel, op))
        })
        .collect()
}

fn with_op(paths: Vec<PathBuf>, op: ChangeOp) -> Vec<(PathBuf, ChangeOp)> {
    paths.into_iter().map(|p| (p, op)).collect()
}
