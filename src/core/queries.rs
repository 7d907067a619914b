/// Named query set
///
/// The nine fixed metric kinds the dashboard polls, each bound to one PromQL
/// expression. The dispatcher iterates `MetricKind::ALL`, so adding a kind
/// only requires a new variant here and a new arm in the normalizer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "cpuUsage")]
    CpuUsage,
    #[serde(rename = "memoryUsage")]
    MemoryUsage,
    #[serde(rename = "diskIO")]
    DiskIo,
    #[serde(rename = "networkTraffic")]
    NetworkTraffic,
    #[serde(rename = "podCount")]
    PodCount,
    #[serde(rename = "serviceCount")]
    ServiceCount,
    #[serde(rename = "topPodsCPU")]
    TopPodsCpu,
    #[serde(rename = "topPodsMemory")]
    TopPodsMemory,
    #[serde(rename = "clusterHealth")]
    ClusterHealth,
}

/// How the normalizer shapes a metric's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricShape {
    /// Ordered (timestamp, value) points
    Series,
    /// Single number aggregated from the samples
    Counter,
    /// Source-ordered (pod, value) pairs
    Ranked,
    /// Ratio in [0, 1], passed through unclamped
    Ratio,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
        MetricKind::DiskIo,
        MetricKind::NetworkTraffic,
        MetricKind::PodCount,
        MetricKind::ServiceCount,
        MetricKind::TopPodsCpu,
        MetricKind::TopPodsMemory,
        MetricKind::ClusterHealth,
    ];

    /// Name used as the key in the aggregation endpoint's JSON body
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpuUsage",
            MetricKind::MemoryUsage => "memoryUsage",
            MetricKind::DiskIo => "diskIO",
            MetricKind::NetworkTraffic => "networkTraffic",
            MetricKind::PodCount => "podCount",
            MetricKind::ServiceCount => "serviceCount",
            MetricKind::TopPodsCpu => "topPodsCPU",
            MetricKind::TopPodsMemory => "topPodsMemory",
            MetricKind::ClusterHealth => "clusterHealth",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "CPU Usage",
            MetricKind::MemoryUsage => "Memory Usage",
            MetricKind::DiskIo => "Disk I/O",
            MetricKind::NetworkTraffic => "Network Traffic",
            MetricKind::PodCount => "Pods",
            MetricKind::ServiceCount => "Services",
            MetricKind::TopPodsCpu => "Top CPU Consuming Pods",
            MetricKind::TopPodsMemory => "Top Memory Consuming Pods",
            MetricKind::ClusterHealth => "Cluster Health",
        }
    }

    pub fn expression(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => {
                r#"sum(rate(node_cpu_seconds_total{mode!="idle"}[5m])) by (instance)"#
            }
            MetricKind::MemoryUsage => {
                "sum(node_memory_MemTotal_bytes - node_memory_MemAvailable_bytes) by (instance)"
            }
            MetricKind::DiskIo => "sum(rate(node_disk_io_time_seconds_total[5m])) by (instance)",
            MetricKind::NetworkTraffic => {
                "sum(rate(node_network_receive_bytes_total[5m]) + rate(node_network_transmit_bytes_total[5m])) by (instance)"
            }
            MetricKind::PodCount => "count(kube_pod_info) by (node)",
            MetricKind::ServiceCount => "count(kube_service_info)",
            MetricKind::TopPodsCpu => {
                "topk(5, sum(rate(container_cpu_usage_seconds_total[5m])) by (pod))"
            }
            MetricKind::TopPodsMemory => "topk(5, sum(container_memory_usage_bytes) by (pod))",
            MetricKind::ClusterHealth => {
                r#"sum(kube_node_status_condition{condition="Ready", status="true"}) / count(kube_node_status_condition{condition="Ready"})"#
            }
        }
    }

    pub fn shape(&self) -> MetricShape {
        match self {
            MetricKind::CpuUsage
            | MetricKind::MemoryUsage
            | MetricKind::DiskIo
            | MetricKind::NetworkTraffic => MetricShape::Series,
            MetricKind::PodCount | MetricKind::ServiceCount => MetricShape::Counter,
            MetricKind::TopPodsCpu | MetricKind::TopPodsMemory => MetricShape::Ranked,
            MetricKind::ClusterHealth => MetricShape::Ratio,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}
