// src/engine/mod.rs

//! Reload engine.
//!
//! The pure planning rules live in [`core`]; the async shell that runs
//! them against the VFS, the builder and the supervisor is in [`runtime`].

pub mod core;
pub mod runtime;

pub use core::{effective_decision, initial_plan, plan, CycleOutcome, ReloadStep, Stage};
pub use runtime::{Artifacts, Orchestrator};
