// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod serve;
pub mod watch;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::{RetriggerBehaviour, Runtime, RuntimeEvent, RuntimeOptions, TriggerQueue};
use crate::pipeline::PipelineContext;
use crate::serve::ReloadHub;
use crate::watch::build_watch_rules;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler / queue / runtime
/// - pipeline executor
/// - (serve mode) file watcher + dev server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path);

    match args.command.unwrap_or(Command::Build { task: None }) {
        Command::Build { task } => run_build(cfg, root, task).await,
        Command::Serve => run_serve(cfg, root).await,
        Command::Deploy => run_deploy(cfg, root).await,
    }
}

/// One-shot build: trigger the requested tasks (all of them by default) and
/// exit once the runtime goes idle. Exits non-zero if any task failed.
async fn run_build(cfg: ConfigFile, root: PathBuf, only: Option<String>) -> Result<()> {
    let scheduler = Scheduler::from_config(&cfg);
    let queue = build_queue(&cfg)?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let ctx = Arc::new(PipelineContext {
        root: root.clone(),
        vars: cfg.vars.clone(),
    });
    let exec_tx = pipeline::spawn_executor(ctx, rt_tx);

    let seeds: Vec<String> = match only {
        Some(name) => {
            if !cfg.task.contains_key(&name) {
                bail!("unknown task '{name}'");
            }
            vec![name]
        }
        None => cfg.task.keys().cloned().collect(),
    };

    let options = RuntimeOptions {
        exit_when_idle: true,
    };

    Runtime::new(scheduler, queue, options, rt_rx, exec_tx)
        .with_seed_tasks(seeds)
        .run()
        .await
}

/// Serve mode: full build, then watchers + static server with live reload.
/// Runs until Ctrl-C.
async fn run_serve(cfg: ConfigFile, root: PathBuf) -> Result<()> {
    let scheduler = Scheduler::from_config(&cfg);
    let queue = build_queue(&cfg)?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let ctx = Arc::new(PipelineContext {
        root: root.clone(),
        vars: cfg.vars.clone(),
    });
    let exec_tx = pipeline::spawn_executor(ctx, rt_tx.clone());

    let hub = ReloadHub::new();

    let rules = build_watch_rules(&cfg)?;
    let _watcher_handle = watch::spawn_watcher(root.clone(), rules, rt_tx.clone())?;

    // Static server, rooted relative to the project directory.
    {
        let mut server_cfg = cfg.server.clone();
        server_cfg.root = root.join(&server_cfg.root).to_string_lossy().into_owned();
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(err) = serve::run_server(server_cfg, hub).await {
                error!(error = %err, "dev server stopped");
            }
        });
    }

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    // Initial full build happens as the runtime's seeded first run.
    let seeds: Vec<String> = cfg.task.keys().cloned().collect();

    let options = RuntimeOptions {
        exit_when_idle: false,
    };

    Runtime::new(scheduler, queue, options, rt_rx, exec_tx)
        .with_reload_hub(hub)
        .with_seed_tasks(seeds)
        .run()
        .await
}

/// Deploy mode: one-shot upload of the configured globs.
async fn run_deploy(cfg: ConfigFile, root: PathBuf) -> Result<()> {
    let Some(section) = cfg.deploy else {
        bail!("config has no [deploy] section");
    };

    let summary = deploy::run_deploy(root, section).await?;
    info!(
        uploaded = summary.uploaded,
        bytes = summary.bytes,
        "deploy complete"
    );
    Ok(())
}

fn build_queue(cfg: &ConfigFile) -> Result<TriggerQueue> {
    let behaviour =
        RetriggerBehaviour::from_str(&cfg.runner.on_retrigger).map_err(|e| anyhow!(e))?;
    Ok(TriggerQueue::new(behaviour, cfg.runner.queue_length))
}

/// Figure out the project root for globs and watching.
/// Currently: directory containing the config file, or `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Simple dry-run output: print tasks, prerequisites and stages.
fn print_dry_run(cfg: &ConfigFile) {
    println!("siteforge dry-run");
    println!("  runner.on_retrigger = {}", cfg.runner.on_retrigger);
    println!("  runner.queue_length = {}", cfg.runner.queue_length);
    println!("  server.port = {}", cfg.server.port);
    if let Some(ref sp) = cfg.server.start_path {
        println!("  server.start_path = {sp}");
    }
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        if let Some(ref globs) = task.clean {
            println!("      clean: {:?}", globs);
        }
        if let Some(ref src) = task.src {
            println!("      src: {:?}", src);
        }
        if let Some(ref dest) = task.dest {
            println!("      dest: {dest}");
        }
        if !task.stages.is_empty() {
            println!("      stages: {:?}", task.stages);
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(ref watch) = task.watch {
            println!("      watch: {:?}", watch);
        }
        if task.reload {
            println!("      reload: true");
        }
        if task.use_hash {
            println!("      use_hash: true");
        }
        if let Some(ref ext) = task.ext {
            println!("      ext: {ext}");
        }
    }

    if let Some(ref d) = cfg.deploy {
        println!();
        println!(
            "deploy: {}:{} (secure: {}), globs {:?}",
            d.host, d.port, d.secure, d.globs
        );
    }
}
