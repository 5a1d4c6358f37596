// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod package;
pub mod sigqueue;
pub mod source;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, config_dir, load_and_validate};
use crate::engine::{ContextId, Loader};
use crate::fs::{FileSystem, RealFileSystem};
use crate::package::Environment;
use crate::sigqueue::Sigqueue;
use crate::watch::WatchEvent;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - one loader context per configured environment
/// - ordered per-environment reports
/// - (optional) file watcher
/// - Ctrl-C handling
///
/// Returns `Ok(false)` when a one-shot run found errors.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    let root = args.root.clone().unwrap_or_else(|| config_dir(&args.config));
    let root = root.canonicalize().unwrap_or(root);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let collaborators = cfg.collaborators(Arc::clone(&fs));

    if args.dry_run {
        let dirs = collaborators
            .scanner
            .package_dirs(&root)
            .with_context(|| format!("listing packages under {}", root.display()))?;
        print_dry_run(&cfg, &root, &dirs);
        return Ok(true);
    }

    let loader = Loader::new(collaborators, cfg.loader_options());

    let mut contexts = Vec::with_capacity(cfg.environments.len());
    for env in &cfg.environments {
        let ctx = loader.new_context(env.clone())?;
        loader.load_directory(ctx, &root).await?;
        contexts.push((ctx, env.clone()));
    }
    info!(
        root = %root.display(),
        environments = contexts.len(),
        "initial load started"
    );

    let errors = tokio::select! {
        res = report_all(&loader, &contexts, &root) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received; shutting down loader");
            loader.shutdown();
            return Ok(false);
        }
    };
    if !args.watch {
        loader.shutdown();
        return Ok(errors == 0);
    }

    let (events_tx, mut events_rx) = mpsc::channel::<WatchEvent>(64);
    let _watcher = watch::spawn_watcher(
        root.clone(),
        loader.clone(),
        fs,
        cfg.loader.extension.clone(),
        events_tx,
    )?;

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(first) = event else { break };
                let mut batch = vec![first];
                while let Ok(more) = events_rx.try_recv() {
                    batch.push(more);
                }
                for event in &batch {
                    println!(
                        "{} {:?}: {} package(s) reset",
                        display_rel(&root, &event.path),
                        event.change,
                        event.reset.len()
                    );
                }
                report_all(&loader, &contexts, &root).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received; shutting down loader");
                break;
            }
        }
    }

    loader.shutdown();
    Ok(true)
}

/// Wait for every context to settle and print one report per environment,
/// in config order, as soon as each one's turn comes.
///
/// Returns the total number of error diagnostics and failures.
async fn report_all(
    loader: &Loader,
    contexts: &[(ContextId, Environment)],
    root: &Path,
) -> Result<usize> {
    let (queue, mut delivered) = Sigqueue::new();
    let queue = Arc::new(queue);

    for (id, (ctx, _)) in (0u64..).zip(contexts) {
        queue.wait_on(id)?;
        let loader = loader.clone();
        let queue = Arc::clone(&queue);
        let ctx = *ctx;
        tokio::spawn(async move {
            if let Err(err) = loader.wait(ctx).await {
                warn!(ctx = %ctx, error = %err, "wait ended early");
            }
            if let Err(err) = queue.ready(id) {
                warn!(ctx = %ctx, error = %err, "cannot mark report ready");
            }
        });
    }

    let mut total = 0;
    for _ in 0..contexts.len() {
        let Some(id) = delivered.recv().await else {
            break;
        };
        if loader.is_shut_down() {
            anyhow::bail!("loader shut down before all environments settled");
        }
        let (ctx, env) = &contexts[id as usize];
        total += print_report(loader, *ctx, env, root)?;
    }
    Ok(total)
}

fn print_report(
    loader: &Loader,
    ctx: ContextId,
    env: &Environment,
    root: &Path,
) -> Result<usize> {
    let packages = loader.packages(ctx)?;
    let failures = loader.failures(ctx)?;

    let mut lines = Vec::new();
    let mut errors = 0;
    loader.errors(ctx, |_, diagnostics| {
        for d in diagnostics {
            if d.is_error() {
                errors += 1;
            }
            lines.push(format!(
                "  {}:{}:{}: {}: {}",
                display_rel(root, &d.file),
                d.line,
                d.col,
                d.severity,
                d.message
            ));
        }
    })?;

    println!(
        "== {env}: {} package(s), {} diagnostic(s), {} failure(s)",
        packages.len(),
        lines.len(),
        failures.len()
    );
    for line in &lines {
        println!("{line}");
    }
    for (dir, failure) in &failures {
        println!("  {}: failed: {failure}", display_rel(root, dir));
    }

    Ok(errors + failures.len())
}

fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Simple dry-run output: print loader settings, environments and the
/// package directories that would be loaded.
fn print_dry_run(cfg: &ConfigFile, root: &Path, dirs: &[PathBuf]) {
    println!("caravan dry-run");
    println!("  loader.extension = {}", cfg.loader.extension);
    println!("  loader.test_suffix = {}", cfg.loader.test_suffix);
    println!("  loader.event_buffer = {}", cfg.loader.event_buffer);
    if !cfg.loader.search_paths.is_empty() {
        println!("  loader.search_paths = {:?}", cfg.loader.search_paths);
    }
    if !cfg.loader.exclude.is_empty() {
        println!("  loader.exclude = {:?}", cfg.loader.exclude);
    }
    println!();

    println!("environments ({}):", cfg.environments.len());
    for env in &cfg.environments {
        println!("  - {env}");
    }
    println!();

    println!("packages under {} ({}):", root.display(), dirs.len());
    for dir in dirs {
        println!("  - {}", display_rel(root, dir));
    }

    debug!("dry-run complete (nothing loaded)");
}
