//! `sheetwatch` command-line entry point.
//!
//! `build` runs the batch baseline pipeline and exits; `watch` runs the
//! same build first and then monitors the configured roots until a signal
//! asks for a graceful stop (a second signal exits hard).

mod targets;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sheetwatch_io::SnapshotEngine;
use sheetwatch_monitor::{
    BaselineBuilder, ChangeCheck, MemoryMonitor, Monitor, MonitorConfig,
};
use sheetwatch_store::{clear_progress, load_progress, AuditLog, BaselineStore};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sheetwatch", version, about = "Semantic change monitoring for spreadsheet workbooks")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, default_value = "sheetwatch.json")]
    config: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or refresh baselines for the configured targets, then exit.
    Build {
        /// Ignore any resume record and start from the first file.
        #[arg(long)]
        no_resume: bool,
    },
    /// Run the startup baseline build, then monitor for changes.
    Watch,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    let stop = Arc::new(AtomicBool::new(false));
    install_signal_handler(Arc::clone(&stop))?;

    match cli.command {
        Command::Build { no_resume } => {
            run_build(&config, stop, no_resume)?;
        }
        Command::Watch => run_watch(config, stop)?,
    }
    Ok(())
}

/// First signal: cooperative stop, state preserved. Second signal: hard
/// exit.
fn install_signal_handler(stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    let signals_seen = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if signals_seen.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::warn!("stop requested, finishing current work (signal again to force exit)");
            stop.store(true, Ordering::Relaxed);
        } else {
            std::process::exit(130);
        }
    })
    .context("installing signal handler")
}

fn run_build(
    config: &MonitorConfig,
    stop: Arc<AtomicBool>,
    no_resume: bool,
) -> anyhow::Result<()> {
    let targets = targets::discover(config);
    if targets.is_empty() {
        tracing::warn!("no build targets (check watch_dirs / manual_targets)");
        return Ok(());
    }

    let resume_enabled = config.enable_resume && !no_resume;
    let start_index = if resume_enabled {
        offer_resume(&config.resume_log, targets.len())?
    } else {
        clear_progress(&config.resume_log)?;
        0
    };

    let builder = BaselineBuilder::new(
        SnapshotEngine::new(config.effective_cache_dir()),
        BaselineStore::new(&config.baseline_dir)?,
        stop,
        config.file_timeout(),
        memory_monitor(config),
        config.enable_resume.then(|| config.resume_log.clone()),
    );
    builder.build(&targets, start_index)?;
    Ok(())
}

fn run_watch(config: MonitorConfig, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    run_build(&config, Arc::clone(&stop), false)?;
    if stop.load(Ordering::Relaxed) {
        return Ok(());
    }

    let check = Arc::new(ChangeCheck::new(
        SnapshotEngine::new(config.effective_cache_dir()),
        BaselineStore::new(&config.baseline_dir)?,
        AuditLog::new(&config.log_dir)?,
        config.force_baseline_patterns.clone(),
    ));
    let monitor = Monitor::new(config, check, stop);
    monitor.run()?;
    Ok(())
}

fn memory_monitor(config: &MonitorConfig) -> Option<MemoryMonitor> {
    if !config.enable_memory_monitor {
        return None;
    }
    let monitor = MemoryMonitor::new(config.memory_limit_mb);
    if monitor.is_none() {
        tracing::warn!("memory monitor unavailable, building unsupervised");
    }
    monitor
}

/// Offer to continue an interrupted build. EOF or a plain enter resumes;
/// an explicit `n` starts over and discards the record.
fn offer_resume(resume_log: &Path, total_now: usize) -> anyhow::Result<usize> {
    let progress = match load_progress(resume_log) {
        Ok(Some(progress)) => progress,
        Ok(None) => return Ok(0),
        Err(err) => {
            tracing::warn!(%err, "resume record unreadable, starting over");
            clear_progress(resume_log)?;
            return Ok(0);
        }
    };
    if progress.completed == 0 || progress.completed >= total_now {
        clear_progress(resume_log)?;
        return Ok(0);
    }

    eprint!(
        "Previous build stopped after {}/{} files at {}. Resume from file {}? [Y/n] ",
        progress.completed,
        progress.total,
        progress.timestamp,
        progress.completed + 1
    );
    std::io::stderr().flush().ok();

    let mut answer = String::new();
    let declined = std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .map(|_| answer.trim().eq_ignore_ascii_case("n"))
        .unwrap_or(false);
    if declined {
        clear_progress(resume_log)?;
        Ok(0)
    } else {
        tracing::info!(completed = progress.completed, "resuming build");
        Ok(progress.completed)
    }
}
