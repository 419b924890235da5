// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `siteforge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "siteforge",
    version,
    about = "Declarative asset build pipeline with file watching, dev server and FTP deploy.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project file (TOML).
    ///
    /// Default: `Siteforge.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Siteforge.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEFORGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// One-shot build of every task (the default when no command is given).
    ///
    /// Exits 0 when all tasks succeed, non-zero otherwise.
    Build {
        /// Restrict the run to this task plus its prerequisites.
        #[arg(long, value_name = "NAME")]
        task: Option<String>,
    },

    /// Build, then watch sources and serve the output with live reload.
    ///
    /// Long-running; exits on Ctrl-C.
    Serve,

    /// Upload build artifacts to the configured FTP host.
    ///
    /// Credentials come from SITEFORGE_FTP_USERNAME / SITEFORGE_FTP_PASSWORD /
    /// SITEFORGE_FTP_PATH; the exit code reflects transfer success.
    Deploy,
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
