// src/watch/classify.rs

use std::collections::HashSet;

use crate::types::{ChangeBatch, ChangeOp, ReloadDecision};
use crate::watch::path_utils::extension;

/// Decides whether a batch of changes needs a rebuild-and-restart.
///
/// A batch is `Full` if any event creates or deletes a file, or updates a
/// file whose extension is in the backend-source set. Everything else is
/// `Incremental`.
#[derive(Debug, Clone)]
pub struct ReloadClassifier {
    backend_extensions: HashSet<String>,
}

impl ReloadClassifier {
    pub fn new<I, S>(backend_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend_extensions: backend_extensions
                .into_iter()
                .map(|s| s.into().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    pub fn is_backend_source(&self, path: &str) -> bool {
        extension(path).is_some_and(|ext| self.backend_extensions.contains(ext))
    }

    pub fn classify(&self, batch: &ChangeBatch) -> ReloadDecision {
        let full = batch.events().iter().any(|event| match event.op {
            ChangeOp::Create | ChangeOp::Delete => true,
            ChangeOp::Update => self.is_backend_source(&event.path),
        });

        if full {
            ReloadDecision::Full
        } else {
            ReloadDecision::Incremental
        }
    }
}

impl Default for ReloadClassifier {
    fn default() -> Self {
        Self::new(["go"])
    }
}
