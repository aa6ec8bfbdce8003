// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::ConfigFile;
use crate::watch::path_utils::is_temp_file;

/// Ignores that apply to every project.
pub const BUILTIN_IGNORES: &[&str] = &[".git/**", "target/**", "node_modules/**", ".devloop/**"];

/// Compiled set of paths the watcher never reports.
///
/// Patterns are relative to the watched root. Editor temp files are always
/// ignored on top of the configured globs.
#[derive(Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl IgnoreSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = compile_globset(&patterns)?;
        Ok(Self { patterns, set })
    }

    pub fn is_ignored(&self, rel_path: &str) -> bool {
        rel_path.is_empty() || is_temp_file(rel_path) || self.set.is_match(rel_path)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Build the ignore set for a config: built-ins, the generated output
/// directories, and `[watch].ignore`.
pub fn ignore_set_from_config(cfg: &ConfigFile) -> Result<IgnoreSet> {
    let mut patterns: Vec<String> = BUILTIN_IGNORES.iter().map(|s| s.to_string()).collect();

    for generated in [&cfg.app.entrypoint, &cfg.app.binary] {
        patterns.push(generated.trim_start_matches("./").to_string());
    }
    if let Some(generator) = &cfg.generator {
        patterns.push(generator.entrypoint.trim_start_matches("./").to_string());
        patterns.push(generator.binary.trim_start_matches("./").to_string());
        patterns.push(format!("{}/**", generator.prefix.trim_matches('/')));
    }
    patterns.extend(cfg.watch.ignore.iter().cloned());

    IgnoreSet::new(patterns)
}

/// Compile a list of glob strings into a single `GlobSet`.
pub fn compile_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern {pat:?}"))?;
        builder.add(glob);
    }
    builder.build().context("building globset")
}
