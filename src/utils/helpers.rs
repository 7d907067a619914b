/// Formatting helpers shared by the terminal dashboard and CLI output

use chrono::{Local, TimeZone};
use std::time::Duration;

use super::constants::{HEALTH_CRITICAL, HEALTH_WARN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
}

/// Bucket a ready-node ratio; NaN counts as critical
pub fn health_level(ratio: f64) -> HealthLevel {
    if ratio.is_nan() || ratio < HEALTH_CRITICAL {
        HealthLevel::Critical
    } else if ratio < HEALTH_WARN {
        HealthLevel::Degraded
    } else {
        HealthLevel::Healthy
    }
}

/// Ratio as a whole percentage, e.g. `0.75` -> `75%`
pub fn format_health(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// CPU cores used, shown as a percentage of one core
pub fn format_cpu(cores: f64) -> String {
    format!("{:.2}%", cores * 100.0)
}

/// Binary-prefixed byte size, e.g. `1536` -> `1.50 KB`
pub fn format_bytes(bytes: f64) -> String {
    const SIZES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0.0 {
        return "0 B".to_string();
    }
    if !bytes.is_finite() {
        return format!("{} B", bytes);
    }

    let exponent = (bytes.abs().ln() / 1024f64.ln()).floor();
    let index = exponent.clamp(0.0, (SIZES.len() - 1) as f64) as usize;
    format!("{:.2} {}", bytes / 1024f64.powi(index as i32), SIZES[index])
}

pub fn format_bytes_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

pub fn format_ops(ops_per_sec: f64) -> String {
    format!("{:.2} ops/s", ops_per_sec)
}

pub fn format_count(count: f64) -> String {
    if count.is_finite() {
        format!("{:.0}", count)
    } else {
        count.to_string()
    }
}

/// Millisecond timestamp as local wall-clock time
pub fn format_timestamp_ms(timestamp_ms: f64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms as i64).single() {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Whole-second age such as `1m 5s`
pub fn format_age(age: Duration) -> String {
    humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}
