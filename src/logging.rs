// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The effective filter is resolved in priority order:
//! 1. `--log-level` CLI flag, scoped to this crate's targets
//! 2. `SITEFORGE_LOG`, taken as a full `EnvFilter` directive string
//!    (e.g. `"debug,tower_http=info"`)
//! 3. default: info, with the HTTP layer and watcher backend held at warn

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no CLI level is given.
pub const LOG_ENV_VAR: &str = "SITEFORGE_LOG";

const DEFAULT_DIRECTIVES: &str = "info,tower_http=warn,notify=warn";

/// Directive string for a CLI-chosen level.
///
/// The requested verbosity applies to this crate's targets; everything else
/// stays at warn so per-request tracing from the dev server and raw watcher
/// events don't drown build output. `trace` opens up the whole stack.
pub fn filter_directives(level: LogLevel) -> String {
    match level {
        LogLevel::Trace => "trace".to_string(),
        LogLevel::Error => "warn,siteforge=error".to_string(),
        LogLevel::Warn => "warn,siteforge=warn".to_string(),
        LogLevel::Info => "warn,siteforge=info".to_string(),
        LogLevel::Debug => "warn,siteforge=debug".to_string(),
    }
}

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(filter_directives(level)),
        None => EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
    };

    fmt().with_env_filter(filter).with_target(true).init();

    Ok(())
}
