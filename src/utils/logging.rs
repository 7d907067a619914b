/// Tracing subscriber setup
///
/// Command-line modes log to stderr. The terminal dashboard owns the screen,
/// so it logs to a file in the config directory instead.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::app_config::AppConfig;

const DEFAULT_FILTER: &str = "cluster_pulse=info,tower_http=info";
pub const DASHBOARD_LOG_FILE: &str = "dashboard.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Log to `<config dir>/dashboard.log`. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init_file() -> Result<(WorkerGuard, PathBuf)> {
    let dir = AppConfig::config_dir()?;
    fs::create_dir_all(&dir).context("Failed to create log directory")?;

    let appender = tracing_appender::rolling::never(&dir, DASHBOARD_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();

    Ok((guard, dir.join(DASHBOARD_LOG_FILE)))
}
