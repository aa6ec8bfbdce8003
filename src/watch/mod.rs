// src/watch/mod.rs

//! File watching and reload classification.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing bursts of raw events into [`ChangeBatch`](crate::types::ChangeBatch)es.
//! - Deciding whether a batch needs a full restart ([`ReloadClassifier`]).
//!
//! It does **not** know about processes or the virtual filesystem; the
//! orchestrator consumes batches through [`BatchSource`].

pub mod classify;
pub mod debouncer;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use classify::ReloadClassifier;
pub use debouncer::Debouncer;
pub use patterns::{ignore_set_from_config, IgnoreSet, BUILTIN_IGNORES};
pub use watcher::{translate_event, BatchSource, ChangeWatcher};
