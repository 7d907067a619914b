pub mod aggregator;
pub mod dispatcher;
pub mod normalizer;
pub mod poller;
pub mod prometheus;
pub mod queries;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::AggregatorClient;
pub use dispatcher::{DispatchError, FailurePolicy, MetricsSource, QueryDispatcher, RawResults};
pub use normalizer::{normalize, DashboardViewModel, MetricPoint, MetricStatus, RankedPod};
pub use poller::{DashboardPoller, DashboardState, PollOutcome};
pub use prometheus::{PrometheusClient, PrometheusResponse, QueryError};
pub use queries::{MetricKind, MetricShape};
