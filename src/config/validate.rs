// src/config/validate.rs

use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevloopError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DevloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run all semantic checks that `serde` cannot express.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_build(cfg)?;
    validate_listen(cfg)?;
    validate_watch(cfg)?;
    validate_generator(cfg)?;
    Ok(())
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    let cmd = cfg.build.cmd.trim();
    if cmd.is_empty() {
        return Err(DevloopError::ConfigError(
            "[build].cmd must not be empty".to_string(),
        ));
    }
    for placeholder in ["{entry}", "{output}"] {
        if !cmd.contains(placeholder) {
            return Err(DevloopError::ConfigError(format!(
                "[build].cmd must contain the {placeholder} placeholder (got {cmd:?})"
            )));
        }
    }
    Ok(())
}

fn validate_listen(cfg: &RawConfigFile) -> Result<()> {
    if cfg.listen.port_attempts == 0 {
        return Err(DevloopError::ConfigError(
            "[listen].port_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(DevloopError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    for ext in cfg.watch.backend_extensions.iter() {
        if ext.is_empty() || ext.starts_with('.') {
            return Err(DevloopError::ConfigError(format!(
                "[watch].backend_extensions entries must be bare extensions like \"go\" (got {ext:?})"
            )));
        }
    }
    Ok(())
}

fn validate_generator(cfg: &RawConfigFile) -> Result<()> {
    let Some(generator) = &cfg.generator else {
        return Ok(());
    };

    let prefix = generator.prefix.trim_matches('/');
    if prefix.is_empty() {
        return Err(DevloopError::ConfigError(
            "[generator].prefix must not be empty".to_string(),
        ));
    }
    if Path::new(&generator.prefix).is_absolute() {
        return Err(DevloopError::ConfigError(format!(
            "[generator].prefix must be relative to the project root (got {:?})",
            generator.prefix
        )));
    }
    if generator.entrypoint == cfg.app.entrypoint || generator.binary == cfg.app.binary {
        return Err(DevloopError::ConfigError(
            "[generator] entrypoint/binary must differ from the [app] ones".to_string(),
        ));
    }
    Ok(())
}
