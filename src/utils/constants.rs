/// Defaults and fixed parameters

use std::time::Duration;

/// Default Prometheus server when nothing is configured
pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";

/// Instant query endpoint, relative to the Prometheus base URL
pub const PROMETHEUS_QUERY_PATH: &str = "/api/v1/query";

/// Aggregation endpoint served by `cluster-pulse serve`
pub const AGGREGATE_PATH: &str = "/api/prometheus";

/// Poll interval for every dashboard (not configurable at runtime)
pub const POLL_INTERVAL: Duration = Duration::from_millis(60_000);

/// Per-request timeout; keeps a tick well inside one poll interval
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Body returned by the aggregation endpoint on any upstream failure
pub const AGGREGATE_FAILURE_MESSAGE: &str = "Failed to query Prometheus";

/// Health thresholds used for coloring (below WARN is yellow, below CRITICAL red)
pub const HEALTH_CRITICAL: f64 = 0.5;
pub const HEALTH_WARN: f64 = 0.8;

/// Config directory name under the platform config dir
pub const APP_DIR_NAME: &str = "cluster-pulse";
