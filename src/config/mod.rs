// src/config/mod.rs

//! Configuration loading and validation for devloop.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: the checks that turn a `RawConfigFile` into a `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AppSection, BuildSection, ConfigFile, GeneratorSection, ListenSection, ProcessSection,
    RawConfigFile, WatchSection,
};
pub use validate::validate_config;
