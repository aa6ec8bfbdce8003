// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [app]
/// template = "templates/app.go"
/// inputs = ["app/**", "view/**"]
///
/// [build]
/// cmd = "go build -o {output} {entry}"
///
/// [listen]
/// web = "127.0.0.1:3000"
///
/// [watch]
/// backend_extensions = ["go"]
/// ```
///
/// All sections are optional and have reasonable defaults, except that
/// `[app].template` must point at the entrypoint source template.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub app: AppSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub listen: ListenSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub process: ProcessSection,

    /// Optional remote-mount generator served by a child process.
    #[serde(default)]
    pub generator: Option<GeneratorSection>,
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub app: AppSection,
    pub build: BuildSection,
    pub listen: ListenSection,
    pub watch: WatchSection,
    pub process: ProcessSection,
    pub generator: Option<GeneratorSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            app: raw.app,
            build: raw.build,
            listen: raw.listen,
            watch: raw.watch,
            process: raw.process,
            generator: raw.generator,
        }
    }
}

/// `[app]` section: the generated application entrypoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// Template rendered into the entrypoint source on every sync.
    #[serde(default = "default_app_template")]
    pub template: String,

    /// Where the rendered entrypoint is written (workspace-relative).
    #[serde(default = "default_app_entrypoint")]
    pub entrypoint: String,

    /// Where the compiled application binary is written.
    #[serde(default = "default_app_binary")]
    pub binary: String,

    /// Globs of source paths the entrypoint depends on.
    #[serde(default)]
    pub inputs: Vec<String>,
}

fn default_app_template() -> String {
    "devloop/app.tmpl".to_string()
}

fn default_app_entrypoint() -> String {
    ".devloop/app/main.go".to_string()
}

fn default_app_binary() -> String {
    ".devloop/app/app".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            template: default_app_template(),
            entrypoint: default_app_entrypoint(),
            binary: default_app_binary(),
            inputs: Vec::new(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Shell command used to compile an entrypoint. `{entry}` and `{output}`
    /// are substituted with the respective paths.
    #[serde(default = "default_build_cmd")]
    pub cmd: String,

    /// Extra environment for build commands.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_build_cmd() -> String {
    "go build -o {output} {entry}".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            cmd: default_build_cmd(),
            env: BTreeMap::new(),
        }
    }
}

/// `[listen]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenSection {
    /// Public address handed to the application.
    #[serde(default = "default_web_addr")]
    pub web: String,

    /// Control/dev server address.
    #[serde(default = "default_control_addr")]
    pub control: String,

    /// How many consecutive ports to try when `web` is already in use.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,
}

fn default_web_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_control_addr() -> String {
    "127.0.0.1:35729".to_string()
}

fn default_port_attempts() -> u16 {
    10
}

impl Default for ListenSection {
    fn default() -> Self {
        Self {
            web: default_web_addr(),
            control: default_control_addr(),
            port_attempts: default_port_attempts(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directory to watch, relative to the config file.
    #[serde(default = "default_watch_root")]
    pub root: String,

    /// Quiescence window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Extensions (without the leading dot) whose edits need a restart.
    #[serde(default = "default_backend_extensions")]
    pub backend_extensions: Vec<String>,

    /// Globs that are never reported, in addition to the built-in ignores.
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_watch_root() -> String {
    ".".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_backend_extensions() -> Vec<String> {
    vec!["go".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            root: default_watch_root(),
            debounce_ms: default_debounce_ms(),
            backend_extensions: default_backend_extensions(),
            ignore: Vec::new(),
        }
    }
}

/// `[process]` section: how the application process is run.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    /// Grace period between SIGTERM and SIGKILL.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Arguments passed to the application binary.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment passed to the application.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}

/// `[generator]` section: a generator binary that serves a subtree.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSection {
    /// Template for the generator's entrypoint source.
    pub template: String,

    #[serde(default = "default_generator_entrypoint")]
    pub entrypoint: String,

    #[serde(default = "default_generator_binary")]
    pub binary: String,

    /// Where the served tree is mounted in the virtual filesystem.
    #[serde(default = "default_generator_prefix")]
    pub prefix: String,

    /// Globs of sources that require rebuilding the generator.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// How long to wait for the spawned generator to connect back.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_generator_entrypoint() -> String {
    ".devloop/generator/main.go".to_string()
}

fn default_generator_binary() -> String {
    ".devloop/generator/generator".to_string()
}

fn default_generator_prefix() -> String {
    ".devloop/generated".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
