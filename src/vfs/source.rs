// src/vfs/source.rs

//! Rendering entrypoint sources.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{DevloopError, Result};
use crate::fs::FileSystem;
use crate::types::BoxFuture;
use crate::vfs::context::{GenerateContext, Generator};

/// Renders the source of a generated entrypoint.
pub trait SourceRenderer: Send + Sync {
    fn render(&self) -> Result<Vec<u8>>;
}

/// A template file on disk. `{{name}}` placeholders are replaced by the
/// configured variables; unknown placeholders are left alone.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    vars: BTreeMap<String, String>,
}

impl TemplateFile {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl SourceRenderer for TemplateFile {
    fn render(&self) -> Result<Vec<u8>> {
        let mut text = self.fs.read_to_string(&self.path).map_err(|e| DevloopError::Generation {
            path: self.path.display().to_string(),
            message: format!("reading template: {e}"),
        })?;
        for (name, value) in &self.vars {
            text = text.replace(&format!("{{{{{name}}}}}"), value);
        }
        Ok(text.into_bytes())
    }
}

/// Generator whose output is whatever its renderer produces.
pub struct SourceGenerator {
    renderer: Arc<dyn SourceRenderer>,
}

impl SourceGenerator {
    pub fn new(renderer: Arc<dyn SourceRenderer>) -> Self {
        Self { renderer }
    }
}

impl Generator for SourceGenerator {
    fn generate<'a>(&'a mut self, _cx: &'a mut GenerateContext) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move { self.renderer.render() })
    }
}
