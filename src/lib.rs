// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod handoff;
pub mod logging;
pub mod remote;
pub mod server;
pub mod types;
pub mod vfs;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{Artifacts, Orchestrator};
use crate::exec::{Builder, CommandBuilder, RealProcessBackend, Supervisor, SupervisorOptions};
use crate::fs::{FileSystem, RealFileSystem};
use crate::handoff::ListenerHandoff;
use crate::remote::{RemoteCommand, RemoteMountGenerator};
use crate::server::{run_pair, ControlServer};
use crate::vfs::{SourceGenerator, TemplateFile, VirtualFileSystem};
use crate::watch::{ignore_set_from_config, ChangeWatcher, ReloadClassifier};

/// Name of the public listener; children find it under `DEVLOOP_WEB_FD`.
pub const WEB_LISTENER: &str = "web";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the public listener handoff and the control server
/// - the virtual filesystem and its generators
/// - the supervisor, builder and orchestrator
/// - the file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    if let Some(listen) = &args.listen {
        cfg.listen.web = listen.clone();
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path).join(&cfg.watch.root);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let bus = EventBus::new();

    let handoff = Arc::new(ListenerHandoff::bind(
        &cfg.listen.web,
        cfg.listen.port_attempts,
        WEB_LISTENER,
    )?);
    info!("serving on http://{}", handoff.local_addr());

    let control = ControlServer::bind(&cfg.listen.control, bus.clone()).await?;
    let control_addr = control.local_addr()?;

    let builder: Arc<dyn Builder> =
        Arc::new(CommandBuilder::new(&cfg.build.cmd, &root).with_env(cfg.build.env.clone()));
    let vfs = build_vfs(&cfg, &root, Arc::clone(&fs), Arc::clone(&builder))?;

    let shutdown_timeout = Duration::from_millis(cfg.process.shutdown_timeout_ms);
    let mut options = SupervisorOptions::new(&root);
    options.args = cfg.process.args.clone();
    options.env = cfg
        .process
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    options.shutdown_timeout = shutdown_timeout;
    let supervisor = Supervisor::new(RealProcessBackend::new(), options)
        .with_handoff(Arc::clone(&handoff))
        .with_control_addr(control_addr);

    let orchestrator = Orchestrator::new(vfs, builder, supervisor, bus)
        .with_classifier(ReloadClassifier::new(cfg.watch.backend_extensions.iter().cloned()))
        .with_artifacts(Artifacts {
            entrypoint: PathBuf::from(&cfg.app.entrypoint),
            binary: PathBuf::from(&cfg.app.binary),
        });

    let watcher = ChangeWatcher::spawn(
        &root,
        ignore_set_from_config(&cfg)?,
        Duration::from_millis(cfg.watch.debounce_ms),
    )?;

    let token = CancellationToken::new();

    // Ctrl-C → graceful shutdown.
    {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received");
            token.cancel();
        });
    }

    run_pair(
        token.clone(),
        control.run(token.clone()),
        orchestrator.run(watcher, token),
    )
    .await?;
    Ok(())
}

/// Register the application entrypoint generator and, if configured, the
/// remote-mount generator.
pub fn build_vfs(
    cfg: &ConfigFile,
    root: &Path,
    fs: Arc<dyn FileSystem>,
    builder: Arc<dyn Builder>,
) -> crate::errors::Result<VirtualFileSystem> {
    let mut vfs = VirtualFileSystem::new(root, Arc::clone(&fs));

    let mut app_template = TemplateFile::new(Arc::clone(&fs), root.join(&cfg.app.template));
    if let Some(generator) = &cfg.generator {
        app_template = app_template.with_var("generated", generator.prefix.trim_matches('/'));
    }
    let mut app_inputs = cfg.app.inputs.clone();
    app_inputs.push(cfg.app.template.clone());
    vfs.generate(
        cfg.app.entrypoint.clone(),
        &app_inputs,
        SourceGenerator::new(Arc::new(app_template)),
    )?;

    if let Some(generator) = &cfg.generator {
        let launcher = RemoteCommand::new(root)
            .with_env(cfg.process.env.clone())
            .with_connect_timeout(Duration::from_millis(generator.connect_timeout_ms))
            .with_shutdown_timeout(Duration::from_millis(cfg.process.shutdown_timeout_ms));
        let template = TemplateFile::new(Arc::clone(&fs), root.join(&generator.template));
        let remote = RemoteMountGenerator::new(Arc::new(template), builder, launcher, fs)
            .with_artifacts(&generator.entrypoint, &generator.binary)
            .with_prefix(generator.prefix.trim_matches('/'));

        let mut inputs = generator.inputs.clone();
        inputs.push(generator.template.clone());
        vfs.generate(generator.entrypoint.clone(), &inputs, remote)?;
    }

    Ok(vfs)
}

/// Figure out a sensible project root for watching.
///
/// - If the config path has a non-empty parent (e.g. "site/Devloop.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Devloop.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: the resolved configuration.
fn print_dry_run(cfg: &ConfigFile) {
    println!("devloop dry-run");
    println!("  app.template = {}", cfg.app.template);
    println!("  app.entrypoint = {}", cfg.app.entrypoint);
    println!("  app.binary = {}", cfg.app.binary);
    if !cfg.app.inputs.is_empty() {
        println!("  app.inputs = {:?}", cfg.app.inputs);
    }
    println!("  build.cmd = {}", cfg.build.cmd);
    println!("  listen.web = {}", cfg.listen.web);
    println!("  listen.control = {}", cfg.listen.control);
    println!("  listen.port_attempts = {}", cfg.listen.port_attempts);
    println!("  watch.root = {}", cfg.watch.root);
    println!("  watch.debounce_ms = {}", cfg.watch.debounce_ms);
    println!("  watch.backend_extensions = {:?}", cfg.watch.backend_extensions);
    if !cfg.watch.ignore.is_empty() {
        println!("  watch.ignore = {:?}", cfg.watch.ignore);
    }
    println!("  process.shutdown_timeout_ms = {}", cfg.process.shutdown_timeout_ms);
    if !cfg.process.args.is_empty() {
        println!("  process.args = {:?}", cfg.process.args);
    }

    match &cfg.generator {
        Some(generator) => {
            println!();
            println!("generator:");
            println!("  template = {}", generator.template);
            println!("  entrypoint = {}", generator.entrypoint);
            println!("  binary = {}", generator.binary);
            println!("  prefix = {}", generator.prefix);
            if !generator.inputs.is_empty() {
                println!("  inputs = {:?}", generator.inputs);
            }
            println!("  connect_timeout_ms = {}", generator.connect_timeout_ms);
        }
        None => println!("  (no generator)"),
    }

    debug!("dry-run complete (no execution)");
}
