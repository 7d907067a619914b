/// Application configuration management
/// Stores settings in <config dir>/cluster-pulse/config.toml, with
/// environment variables and CLI flags layered on top

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::{
    APP_DIR_NAME, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT, DEFAULT_PROMETHEUS_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, POLL_INTERVAL,
};
use crate::core::FailurePolicy;

pub const ENV_PROMETHEUS_URL: &str = "PROMETHEUS_URL";
pub const ENV_ISOLATE_FAILURES: &str = "CLUSTER_PULSE_ISOLATE_FAILURES";
pub const ENV_REQUEST_TIMEOUT: &str = "CLUSTER_PULSE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the Prometheus server every query goes to
    pub prometheus_url: String,
    pub request_timeout_secs: u64,
    /// Keep rendering healthy metrics when some queries fail
    pub isolate_failures: bool,
    pub listen_host: String,
    pub listen_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prometheus_url: DEFAULT_PROMETHEUS_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            isolate_failures: false,
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl AppConfig {
    /// Directory holding the config file and the dashboard log
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(base.join(APP_DIR_NAME))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Override file values with process environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_PROMETHEUS_URL).filter(|u| !u.trim().is_empty()) {
            self.prometheus_url = url.trim().to_string();
        }

        if let Some(flag) = lookup(ENV_ISOLATE_FAILURES) {
            self.isolate_failures = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT).and_then(|s| s.trim().parse().ok()) {
            self.request_timeout_secs = secs;
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.isolate_failures {
            FailurePolicy::Isolate
        } else {
            FailurePolicy::FailFast
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Human-readable problems with the configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.prometheus_url.starts_with("http://") || self.prometheus_url.starts_with("https://")) {
            errors.push(format!(
                "prometheus_url must start with http:// or https:// (got '{}')",
                self.prometheus_url
            ));
        }

        if self.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be greater than 0".to_string());
        } else if self.request_timeout() >= POLL_INTERVAL {
            errors.push(format!(
                "request_timeout_secs ({}) must be shorter than the poll interval ({}s)",
                self.request_timeout_secs,
                POLL_INTERVAL.as_secs()
            ));
        }

        errors
    }
}
