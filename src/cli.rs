// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `caravan`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "caravan",
    version,
    about = "Load a source tree under several build environments and report diagnostics.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Directory to load. Defaults to the config file's directory.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Keep running and re-report whenever a source file changes.
    #[arg(long)]
    pub watch: bool,

    /// Parse + validate the config and list the package directories, but
    /// load nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CARAVAN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
