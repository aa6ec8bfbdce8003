#![allow(dead_code)]

use devloop::config::{ConfigFile, GeneratorSection, RawConfigFile};
use devloop::types::{ChangeBatch, ChangeEvent};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.config.build.cmd = cmd.to_string();
        self
    }

    pub fn web(mut self, addr: &str) -> Self {
        self.config.listen.web = addr.to_string();
        self
    }

    pub fn app_input(mut self, pattern: &str) -> Self {
        self.config.app.inputs.push(pattern.to_string());
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.config.watch.ignore.push(pattern.to_string());
        self
    }

    pub fn backend_extensions(mut self, exts: &[&str]) -> Self {
        self.config.watch.backend_extensions = exts.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn generator(mut self, template: &str, prefix: &str) -> Self {
        self.config.generator = Some(GeneratorSection {
            template: template.to_string(),
            entrypoint: ".devloop/generator/main.go".to_string(),
            binary: ".devloop/generator/generator".to_string(),
            prefix: prefix.to_string(),
            inputs: Vec::new(),
            connect_timeout_ms: 10_000,
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `update` events for each path.
pub fn updates(paths: &[&str]) -> ChangeBatch {
    paths.iter().map(|p| ChangeEvent::update(*p)).collect::<Vec<_>>().into()
}

/// `create` events for each path.
pub fn creates(paths: &[&str]) -> ChangeBatch {
    paths.iter().map(|p| ChangeEvent::create(*p)).collect::<Vec<_>>().into()
}
