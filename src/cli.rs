// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `wfsched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wfsched",
    version,
    about = "Reconstruct workflow event logs and inspect runtime estimates.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WFSCHED_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Reconstruct event logs and print one lifecycle row per run.
    Report {
        /// Skip the header line.
        #[arg(long)]
        no_header: bool,

        /// Also write each cleaned log into this directory.
        #[arg(long, value_name = "DIR")]
        write_cleaned: Option<PathBuf>,

        /// Print execution/input-size increments for one task type on one
        /// host instead of the lifecycle report.
        #[arg(long, value_name = "TASK@HOST")]
        increments: Option<String>,

        /// JSON-lines event logs, one per workflow run.
        #[arg(value_name = "LOG", required = true)]
        logs: Vec<PathBuf>,
    },

    /// Seed the statistics store and print per-host runtime estimates.
    Estimates {
        /// Path to the config file (TOML).
        #[arg(long, value_name = "PATH", default_value = "wfsched.toml")]
        config: PathBuf,

        /// Keep resyncing on the configured interval until Ctrl-C, then
        /// print the final estimates.
        #[arg(long)]
        follow: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
