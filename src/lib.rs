// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod estimate;
pub mod logging;
pub mod logs;
pub mod sched;
pub mod stats;
pub mod types;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::load_and_validate;
use crate::context::SchedulerContext;
use crate::estimate::{EstimatorState, spawn_resync_loop};
use crate::logs::report;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Report {
            no_header,
            write_cleaned,
            increments,
            logs,
        } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            match increments {
                Some(target) => print_increments(&mut out, &logs, &target),
                None => print_report(&mut out, &logs, !no_header, write_cleaned.as_deref()),
            }
        }
        Command::Estimates { config, follow } => run_estimates(&config, follow).await,
    }
}

/// Reconstruct every log and write one TSV row per run.
///
/// Runs that fail to reconstruct are skipped with a warning; the header
/// comes from the first run that succeeds.
pub fn print_report(
    out: &mut impl Write,
    log_paths: &[PathBuf],
    header: bool,
    write_cleaned: Option<&Path>,
) -> Result<()> {
    let mut header_pending = header;

    for path in log_paths {
        let recon = match logs::reconstruct_file(path) {
            Ok(recon) => recon,
            Err(e) => {
                warn!(log = %path.display(), error = %e, "skipping run");
                continue;
            }
        };

        if let Some(dir) = write_cleaned {
            let file_name = path
                .file_name()
                .with_context(|| format!("log path has no file name: {}", path.display()))?;
            let target = dir.join(file_name);
            recon
                .write_cleaned(&target)
                .with_context(|| format!("writing cleaned log {}", target.display()))?;
            info!(log = %target.display(), "wrote cleaned log");
        }

        let run_report = recon.report();
        if header_pending {
            writeln!(out, "{}", run_report.header())?;
            header_pending = false;
        }
        writeln!(out, "{}", run_report.row())?;
    }

    Ok(())
}

/// Write `execution_delta<TAB>file_size_delta` lines for `TASK@HOST`.
pub fn print_increments(out: &mut impl Write, log_paths: &[PathBuf], target: &str) -> Result<()> {
    let Some((task_name, host)) = target.rsplit_once('@') else {
        bail!("expected TASK@HOST, got {target:?}");
    };

    for path in log_paths {
        let recon = match logs::reconstruct_file(path) {
            Ok(recon) => recon,
            Err(e) => {
                warn!(log = %path.display(), error = %e, "skipping run");
                continue;
            }
        };
        for inc in report::increments(&recon, task_name, host) {
            writeln!(out, "{}\t{}", inc.execution_delta, inc.file_size_delta)?;
        }
    }

    Ok(())
}

/// One `host<TAB>task type<TAB>weight<TAB>finished<TAB>time spent` line per
/// observed pair.
pub fn print_estimates(out: &mut impl Write, state: &EstimatorState) -> Result<()> {
    for (host, estimate) in state.iter() {
        if estimate.finished_tasks == 0 {
            continue;
        }
        writeln!(
            out,
            "{host}\t{}\t{:.1}\t{}\t{}",
            estimate.task_type, estimate.weight, estimate.finished_tasks, estimate.time_spent_ms
        )?;
    }
    Ok(())
}

async fn run_estimates(config_path: &Path, follow: bool) -> Result<()> {
    let cfg = load_and_validate(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let interval = cfg.estimator.resync_interval;
    let ctx = SchedulerContext::from_config(cfg);

    let (seeded, resynced) = ctx.initialize()?;
    info!(
        runs = seeded.runs_loaded,
        statistics = resynced.statistics_applied,
        hosts = resynced.new_hosts,
        "estimator initialised"
    );

    if follow {
        let handle = spawn_resync_loop(ctx.estimator().clone(), interval);
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")?;
        handle.abort();
    }

    let stdout = std::io::stdout();
    print_estimates(&mut stdout.lock(), &ctx.estimator().snapshot())
}
