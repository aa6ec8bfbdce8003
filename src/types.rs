use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

/// Boxed `Send` future used at the trait seams (backends, generators, mounts).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind of change observed on a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn label(self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }
}

/// A single filesystem change, path relative to the watched root with
/// forward slashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: String,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, op: ChangeOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    pub fn create(path: impl Into<String>) -> Self {
        Self::new(path, ChangeOp::Create)
    }

    pub fn update(path: impl Into<String>) -> Self {
        Self::new(path, ChangeOp::Update)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, ChangeOp::Delete)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.label(), self.path)
    }
}

/// Changes collected within one quiescence window, in observation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    pub fn new(events: Vec<ChangeEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn paths(&self) -> Vec<String> {
        self.events.iter().map(|e| e.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Append a later batch to this one, keeping observation order.
    pub fn merge(&mut self, later: ChangeBatch) {
        self.events.extend(later.events);
    }
}

impl From<Vec<ChangeEvent>> for ChangeBatch {
    fn from(events: Vec<ChangeEvent>) -> Self {
        Self::new(events)
    }
}

/// Whether a batch can be served without restarting the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadDecision {
    Incremental,
    Full,
}
