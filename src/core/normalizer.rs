/// View-model normalizer
///
/// Turns one batch of raw Prometheus responses into the dashboard view model.
/// Every metric kind has its own typed parser and every parse ends in an
/// explicit outcome, so the renderer can tell "no data" from "bad data".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use super::dispatcher::RawResults;
use super::prometheus::PrometheusSample;
use super::queries::MetricKind;

/// One time-series point, timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPod {
    pub pod: String,
    pub value: f64,
}

/// Result of parsing one metric
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome<T> {
    Ok(T),
    /// No usable sample (absent or empty result)
    Missing,
    /// The result array held something unusable; carries the raw text
    Malformed(String),
}

impl<T> MetricOutcome<T> {
    pub fn status(&self) -> MetricStatus {
        match self {
            MetricOutcome::Ok(_) => MetricStatus::Ok,
            MetricOutcome::Missing => MetricStatus::Missing,
            MetricOutcome::Malformed(raw) => MetricStatus::Malformed { raw: raw.clone() },
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            MetricOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MetricStatus {
    Ok,
    Missing,
    Malformed { raw: String },
}

impl MetricStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, MetricStatus::Ok)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardViewModel {
    pub cpu_usage: Vec<MetricPoint>,
    pub memory_usage: Vec<MetricPoint>,
    #[serde(rename = "diskIO")]
    pub disk_io: Vec<MetricPoint>,
    pub network_traffic: Vec<MetricPoint>,
    pub pod_count: f64,
    pub service_count: f64,
    #[serde(rename = "topPodsCPU")]
    pub top_pods_cpu: Vec<RankedPod>,
    pub top_pods_memory: Vec<RankedPod>,
    pub cluster_health: f64,
    /// Outcome per metric; empty until the first batch is normalized
    pub status: BTreeMap<MetricKind, MetricStatus>,
}

impl Default for DashboardViewModel {
    fn default() -> Self {
        Self {
            cpu_usage: Vec::new(),
            memory_usage: Vec::new(),
            disk_io: Vec::new(),
            network_traffic: Vec::new(),
            pod_count: 0.0,
            service_count: 0.0,
            top_pods_cpu: Vec::new(),
            top_pods_memory: Vec::new(),
            cluster_health: 1.0,
            status: BTreeMap::new(),
        }
    }
}

impl DashboardViewModel {
    pub fn series(&self, kind: MetricKind) -> Option<&[MetricPoint]> {
        match kind {
            MetricKind::CpuUsage => Some(&self.cpu_usage),
            MetricKind::MemoryUsage => Some(&self.memory_usage),
            MetricKind::DiskIo => Some(&self.disk_io),
            MetricKind::NetworkTraffic => Some(&self.network_traffic),
            _ => None,
        }
    }

    pub fn ranked(&self, kind: MetricKind) -> Option<&[RankedPod]> {
        match kind {
            MetricKind::TopPodsCpu => Some(&self.top_pods_cpu),
            MetricKind::TopPodsMemory => Some(&self.top_pods_memory),
            _ => None,
        }
    }

    pub fn status_of(&self, kind: MetricKind) -> Option<&MetricStatus> {
        self.status.get(&kind)
    }

    /// Metrics whose last parse was not `Ok`
    pub fn problems(&self) -> impl Iterator<Item = (MetricKind, &MetricStatus)> {
        self.status
            .iter()
            .filter(|(_, status)| !status.is_ok())
            .map(|(kind, status)| (*kind, status))
    }

    fn settle<T>(&mut self, kind: MetricKind, outcome: MetricOutcome<T>, default: T) -> T {
        if let MetricOutcome::Malformed(raw) = &outcome {
            warn!(metric = %kind, %raw, "malformed metric data");
        }
        self.status.insert(kind, outcome.status());
        outcome.ok().unwrap_or(default)
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.trim().parse::<f64>().map_err(|_| raw.to_string())
}

fn sample_number(sample: &PrometheusSample) -> Result<f64, String> {
    match &sample.value {
        Some(value) => parse_number(value.raw()),
        None => Err("<sample without value>".to_string()),
    }
}

/// Each sample becomes `(timestamp * 1000, value)`, input order kept.
/// Range samples contribute all of their points.
pub fn parse_series(samples: &[PrometheusSample]) -> MetricOutcome<Vec<MetricPoint>> {
    let mut points = Vec::with_capacity(samples.len());

    for sample in samples {
        if sample.value.is_none() && sample.values.is_none() {
            return MetricOutcome::Malformed("<sample without value>".to_string());
        }

        let pairs = sample.value.iter().chain(sample.values.iter().flatten());
        for pair in pairs {
            match parse_number(pair.raw()) {
                Ok(value) => points.push(MetricPoint {
                    timestamp: pair.timestamp() * 1000.0,
                    value,
                }),
                Err(raw) => return MetricOutcome::Malformed(raw),
            }
        }
    }

    MetricOutcome::Ok(points)
}

/// Sum across all samples; one sample per node for the pod count
pub fn parse_sum(samples: &[PrometheusSample]) -> MetricOutcome<f64> {
    let mut total = 0.0;
    for sample in samples {
        match sample_number(sample) {
            Ok(value) => total += value,
            Err(raw) => return MetricOutcome::Malformed(raw),
        }
    }
    MetricOutcome::Ok(total)
}

/// Value of the first sample, unclamped; an empty result is `Missing`
pub fn parse_first(samples: &[PrometheusSample]) -> MetricOutcome<f64> {
    match samples.first() {
        Some(sample) => match sample_number(sample) {
            Ok(value) => MetricOutcome::Ok(value),
            Err(raw) => MetricOutcome::Malformed(raw),
        },
        None => MetricOutcome::Missing,
    }
}

/// `(pod, value)` pairs in source order; the query already ranks them
pub fn parse_ranked(samples: &[PrometheusSample]) -> MetricOutcome<Vec<RankedPod>> {
    let mut pods = Vec::with_capacity(samples.len());
    for sample in samples {
        match sample_number(sample) {
            Ok(value) => pods.push(RankedPod {
                pod: sample.label("pod").unwrap_or_default().to_string(),
                value,
            }),
            Err(raw) => return MetricOutcome::Malformed(raw),
        }
    }
    MetricOutcome::Ok(pods)
}

fn parse_with<T>(
    samples: Option<&[PrometheusSample]>,
    parser: fn(&[PrometheusSample]) -> MetricOutcome<T>,
) -> MetricOutcome<T> {
    samples.map_or(MetricOutcome::Missing, parser)
}

/// Build a fresh view model from one batch. Metrics without a result array
/// keep their zero-state value.
pub fn normalize(raw: &RawResults) -> DashboardViewModel {
    let mut view = DashboardViewModel::default();

    for kind in MetricKind::ALL {
        let samples = raw.samples(kind);
        let samples = samples.as_deref();

        match kind {
            MetricKind::CpuUsage => {
                view.cpu_usage = view.settle(kind, parse_with(samples, parse_series), Vec::new());
            }
            MetricKind::MemoryUsage => {
                view.memory_usage = view.settle(kind, parse_with(samples, parse_series), Vec::new());
            }
            MetricKind::DiskIo => {
                view.disk_io = view.settle(kind, parse_with(samples, parse_series), Vec::new());
            }
            MetricKind::NetworkTraffic => {
                view.network_traffic = view.settle(kind, parse_with(samples, parse_series), Vec::new());
            }
            MetricKind::PodCount => {
                view.pod_count = view.settle(kind, parse_with(samples, parse_sum), 0.0);
            }
            MetricKind::ServiceCount => {
                view.service_count = view.settle(kind, parse_with(samples, parse_first), 0.0);
            }
            MetricKind::TopPodsCpu => {
                view.top_pods_cpu = view.settle(kind, parse_with(samples, parse_ranked), Vec::new());
            }
            MetricKind::TopPodsMemory => {
                view.top_pods_memory = view.settle(kind, parse_with(samples, parse_ranked), Vec::new());
            }
            MetricKind::ClusterHealth => {
                view.cluster_health = view.settle(kind, parse_with(samples, parse_first), 1.0);
            }
        }
    }

    view
}
