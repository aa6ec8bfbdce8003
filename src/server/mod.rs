// src/server/mod.rs

//! The dev server pair: the control server plus the application loop.

pub mod control;
pub mod pair;

pub use control::ControlServer;
pub use pair::run_pair;
