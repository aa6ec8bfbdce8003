#![allow(dead_code)]

//! In-memory stand-ins for processes, builds and mounts.
//!
//! Every fake is `Clone` and clones share state, so a test keeps one handle
//! and hands the other to the code under test. Fakes that share a
//! [`Timeline`] record into one ordered log, which is how tests assert
//! "close before build" style orderings across components.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use devloop::errors::{DevloopError, Result};
use devloop::exec::{Builder, LaunchSpec, ProcessBackend, RunningProcess};
use devloop::remote::{MountLauncher, MountedProcess};
use devloop::types::BoxFuture;
use devloop::vfs::{GenerateContext, Generator, MountSource, SourceRenderer};

/// Ordered log shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Process backend that never touches the OS.
///
/// Logs `spawn <n>` and `terminate <n>`, where `n` counts spawns from 1.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessBackend {
    timeline: Timeline,
    specs: Arc<Mutex<Vec<LaunchSpec>>>,
    spawned: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    fail_spawn: Arc<AtomicBool>,
    fail_terminate: Arc<AtomicBool>,
}

impl FakeProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn specs(&self) -> Vec<LaunchSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Processes spawned and not yet terminated.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }
}

impl ProcessBackend for FakeProcessBackend {
    fn spawn<'a>(&'a mut self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<Box<dyn RunningProcess>>> {
        Box::pin(async move {
            if self.fail_spawn.load(Ordering::SeqCst) {
                self.timeline.push("spawn failed");
                return Err(DevloopError::Spawn {
                    program: spec.program.display().to_string(),
                    message: "fake spawn failure".to_string(),
                });
            }

            let n = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;
            self.live.fetch_add(1, Ordering::SeqCst);
            self.specs.lock().unwrap().push(spec.clone());
            self.timeline.push(format!("spawn {n}"));

            Ok(Box::new(FakeProcess {
                n,
                timeline: self.timeline.clone(),
                live: Arc::clone(&self.live),
                fail_terminate: Arc::clone(&self.fail_terminate),
            }) as Box<dyn RunningProcess>)
        })
    }
}

struct FakeProcess {
    n: usize,
    timeline: Timeline,
    live: Arc<AtomicUsize>,
    fail_terminate: Arc<AtomicBool>,
}

impl RunningProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(10_000 + self.n as u32)
    }

    fn terminate(&mut self, _grace: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_terminate.load(Ordering::SeqCst) {
                self.timeline.push(format!("terminate {} failed", self.n));
                return Err(DevloopError::Lifecycle(format!(
                    "fake process {} would not stop",
                    self.n
                )));
            }
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.timeline.push(format!("terminate {}", self.n));
            Ok(())
        })
    }
}

/// Builder that records `build <entry>` and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeBuilder {
    timeline: Timeline,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    fail: Arc<AtomicBool>,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Builder for FakeBuilder {
    fn build<'a>(&'a self, entry: &'a Path, output: &'a Path) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((entry.to_path_buf(), output.to_path_buf()));
            self.timeline.push(format!("build {}", entry.display()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(DevloopError::Build {
                    entry: entry.display().to_string(),
                    message: "syntax error".to_string(),
                });
            }
            Ok(())
        })
    }
}

/// Mount source backed by a shared map.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    fail: Arc<AtomicBool>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, data: &str) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&self, path: &str, data: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.as_bytes().to_vec());
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl MountSource for StaticSource {
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("source unavailable").into());
            }
            Ok(self.files.lock().unwrap().keys().cloned().collect())
        })
    }

    fn read<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("no such file: {path}").into())
        })
    }
}

/// Launcher for remote mounts. Logs `start <n>` / `close <n>` and tracks
/// the highest number of helpers alive at once.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    timeline: Timeline,
    source: StaticSource,
    launched: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl FakeLauncher {
    pub fn new(source: StaticSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl MountLauncher for FakeLauncher {
    fn launch<'a>(&'a mut self, binary: &'a Path) -> BoxFuture<'a, Result<Box<dyn MountedProcess>>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                self.timeline.push("start failed");
                return Err(DevloopError::Spawn {
                    program: binary.display().to_string(),
                    message: "did not connect".to_string(),
                });
            }

            let n = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);
            self.timeline.push(format!("start {n}"));

            Ok(Box::new(FakeMounted {
                n,
                source: self.source.clone(),
                timeline: self.timeline.clone(),
                live: Arc::clone(&self.live),
                closed: false,
            }) as Box<dyn MountedProcess>)
        })
    }
}

struct FakeMounted {
    n: usize,
    source: StaticSource,
    timeline: Timeline,
    live: Arc<AtomicUsize>,
    closed: bool,
}

impl MountedProcess for FakeMounted {
    fn source(&self) -> Arc<dyn MountSource> {
        Arc::new(self.source.clone())
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                self.live.fetch_sub(1, Ordering::SeqCst);
                self.timeline.push(format!("close {}", self.n));
            }
            Ok(())
        })
    }
}

/// Renderer returning fixed text; the text can be changed between syncs.
#[derive(Debug, Clone, Default)]
pub struct FixedRenderer {
    text: Arc<Mutex<String>>,
    renders: Arc<AtomicUsize>,
}

impl FixedRenderer {
    pub fn new(text: &str) -> Self {
        Self {
            text: Arc::new(Mutex::new(text.to_string())),
            renders: Arc::default(),
        }
    }

    pub fn set(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl SourceRenderer for FixedRenderer {
    fn render(&self) -> Result<Vec<u8>> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.lock().unwrap().clone().into_bytes())
    }
}

/// Generator that returns fixed bytes, counts its runs and can fail.
#[derive(Debug, Clone, Default)]
pub struct CountingGenerator {
    data: Vec<u8>,
    runs: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl CountingGenerator {
    pub fn new(data: &str) -> Self {
        Self {
            data: data.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Generator for CountingGenerator {
    fn generate<'a>(&'a mut self, cx: &'a mut GenerateContext) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(DevloopError::Generation {
                    path: cx.path().to_string(),
                    message: "template error".to_string(),
                });
            }
            Ok(self.data.clone())
        })
    }
}
