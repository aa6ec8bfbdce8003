// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevloopError {
    /// Code generation or templating failed.
    #[error("generation failed for {path}: {message}")]
    Generation { path: String, message: String },

    /// The compiler / build command failed.
    #[error("build failed for {entry}: {message}")]
    Build { entry: String, message: String },

    /// A child process (app or generator) could not be launched.
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// Filesystem observation failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// The public listener could not be bound or made inheritable.
    #[error("listener handoff error: {0}")]
    Handoff(String),

    /// Illegal process state transition, or a process that would not stop.
    #[error("process lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevloopError {
    /// Whether this error ends the dev session.
    ///
    /// Everything else is isolated to the reload cycle that produced it and
    /// surfaces as an `app:error` event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DevloopError::Watch(_) | DevloopError::Handoff(_) | DevloopError::Lifecycle(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevloopError>;
