//! Logging bootstrap.
//!
//! Two sinks: a timestamped log file that always records INFO and above, and
//! the console at the configured level with optional ANSI colors.
//! `RUST_LOG` overrides the console level.

use anyhow::{Context, Result};
use std::sync::Mutex;
use textcast_core::config::Settings;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(settings: &Settings, verbose: bool) -> Result<()> {
    let log_path = settings.log_path();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("cannot open log file '{}'", log_path.display()))?;

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        settings.logging_level.level_filter()
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::INFO);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(settings.use_color)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("logging already initialized")?;
    Ok(())
}
