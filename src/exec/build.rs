// src/exec/build.rs

//! Compiling an entrypoint into a binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{DevloopError, Result};
use crate::types::BoxFuture;

/// Compiles a source entrypoint into a binary artifact.
pub trait Builder: Send + Sync {
    fn build<'a>(&'a self, entry: &'a Path, output: &'a Path) -> BoxFuture<'a, Result<()>>;
}

/// Runs a shell command template such as `go build -o {output} {entry}`.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    template: String,
    dir: PathBuf,
    env: BTreeMap<String, String>,
}

impl CommandBuilder {
    pub fn new(template: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            dir: dir.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// The shell command for one build.
    pub fn command_line(&self, entry: &Path, output: &Path) -> String {
        self.template
            .replace("{entry}", &shell_quote(entry))
            .replace("{output}", &shell_quote(output))
    }

    async fn run(&self, entry: &Path, output: &Path) -> Result<()> {
        let entry_label = entry.display().to_string();
        let build_err = |message: String| DevloopError::Build {
            entry: entry_label.clone(),
            message,
        };

        if let Some(parent) = self.dir.join(output).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let line = self.command_line(entry, output);
        info!(cmd = %line, "building");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };

        cmd.current_dir(&self.dir)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let out = cmd
            .output()
            .await
            .map_err(|e| build_err(format!("running `{line}`: {e}")))?;

        if out.status.success() {
            debug!(entry = %entry_label, "build succeeded");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
        let detail = if stderr.is_empty() { stdout } else { stderr };
        let code = out
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());

        Err(build_err(if detail.is_empty() {
            format!("`{line}` exited with {code}")
        } else {
            detail
        }))
    }
}

impl Builder for CommandBuilder {
    fn build<'a>(&'a self, entry: &'a Path, output: &'a Path) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run(entry, output))
    }
}

fn shell_quote(path: &Path) -> String {
    let s = path.display().to_string();
    if s.chars().all(|c| c.is_ascii_alphanumeric() || "/._-+:@".contains(c)) {
        return s;
    }
    if cfg!(windows) {
        format!("\"{s}\"")
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
