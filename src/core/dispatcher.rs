/// Query fan-out dispatcher
///
/// Issues every named query concurrently against Prometheus and joins on all
/// of them. Under `FailurePolicy::FailFast` one failing query fails the whole
/// batch; under `FailurePolicy::Isolate` failed queries are replaced by an
/// error envelope so the remaining metrics still reach the normalizer.

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

use super::prometheus::{PrometheusClient, PrometheusResponse, PrometheusSample, QueryError};
use super::queries::MetricKind;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("query '{metric}' failed: {source}")]
    Query {
        metric: MetricKind,
        #[source]
        source: QueryError,
    },

    #[error("all {0} queries failed")]
    AllFailed(usize),

    #[error("aggregator request failed: {0}")]
    Aggregator(#[source] QueryError),
}

/// What a single failing query does to its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failure aborts the batch
    #[default]
    FailFast,
    /// Failures are recorded per metric; the batch only fails if every query fails
    Isolate,
}

/// One raw Prometheus response per metric, all from the same batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResults(BTreeMap<MetricKind, PrometheusResponse>);

impl RawResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: MetricKind, response: PrometheusResponse) {
        self.0.insert(kind, response);
    }

    pub fn get(&self, kind: MetricKind) -> Option<&PrometheusResponse> {
        self.0.get(&kind)
    }

    /// Samples for a metric, `None` if the metric or its result array is absent
    pub fn samples(&self, kind: MetricKind) -> Option<Cow<'_, [PrometheusSample]>> {
        self.get(kind).and_then(PrometheusResponse::samples)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from a name-keyed map, skipping names that are not metric kinds
    pub fn from_named(named: HashMap<String, PrometheusResponse>) -> Self {
        let mut results = Self::new();
        for (name, response) in named {
            match name.parse::<MetricKind>() {
                Ok(kind) => results.insert(kind, response),
                Err(_) => debug!(%name, "ignoring unknown metric in aggregate response"),
            }
        }
        results
    }
}

impl FromIterator<(MetricKind, PrometheusResponse)> for RawResults {
    fn from_iter<I: IntoIterator<Item = (MetricKind, PrometheusResponse)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Anything that can produce one batch of raw results per tick
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self) -> Result<RawResults, DispatchError>;

    /// Short human-readable description of where data comes from
    fn describe(&self) -> String;
}

#[derive(Clone)]
pub struct QueryDispatcher {
    client: PrometheusClient,
    policy: FailurePolicy,
}

impl QueryDispatcher {
    pub fn new(client: PrometheusClient, policy: FailurePolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &PrometheusClient {
        &self.client
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run the whole named query set once
    pub async fn dispatch(&self) -> Result<RawResults, DispatchError> {
        match self.policy {
            FailurePolicy::FailFast => self.dispatch_fail_fast().await,
            FailurePolicy::Isolate => self.dispatch_isolated().await,
        }
    }

    async fn dispatch_fail_fast(&self) -> Result<RawResults, DispatchError> {
        let tasks = MetricKind::ALL.into_iter().map(|kind| async move {
            self.client
                .query(kind.expression())
                .await
                .map(|response| (kind, response))
                .map_err(|source| DispatchError::Query { metric: kind, source })
        });

        let results = try_join_all(tasks).await?;
        Ok(results.into_iter().collect())
    }

    async fn dispatch_isolated(&self) -> Result<RawResults, DispatchError> {
        let tasks = MetricKind::ALL.into_iter().map(|kind| async move {
            (kind, self.client.query(kind.expression()).await)
        });

        let mut results = RawResults::new();
        let mut failed = 0;

        for (kind, outcome) in join_all(tasks).await {
            match outcome {
                Ok(response) => results.insert(kind, response),
                Err(e) => {
                    warn!(metric = %kind, error = %e, "query failed, continuing with remaining metrics");
                    failed += 1;
                    results.insert(kind, PrometheusResponse::failure("upstream", e.to_string()));
                }
            }
        }

        if failed == MetricKind::ALL.len() {
            return Err(DispatchError::AllFailed(failed));
        }

        Ok(results)
    }
}

#[async_trait]
impl MetricsSource for QueryDispatcher {
    async fn fetch(&self) -> Result<RawResults, DispatchError> {
        self.dispatch().await
    }

    fn describe(&self) -> String {
        self.client.base_url().to_string()
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use crate::core::prometheus::ResponseStatus;
    use crate::core::test_support::spawn_fake_prometheus;
    use std::sync::atomic::Ordering;

    fn dispatcher(base_url: &str, policy: FailurePolicy) -> QueryDispatcher {
        QueryDispatcher::new(PrometheusClient::new(base_url).unwrap(), policy)
    }

    #[tokio::test]
    async fn test_dispatch_returns_every_metric() {
        let upstream = spawn_fake_prometheus(None).await;

        let results = dispatcher(&upstream.base_url, FailurePolicy::FailFast)
            .dispatch()
            .await
            .unwrap();

        assert_eq!(results.len(), MetricKind::ALL.len());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), MetricKind::ALL.len());
        for kind in MetricKind::ALL {
            assert_eq!(results.get(kind).unwrap().status, ResponseStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_one_failing_query_fails_the_batch() {
        let upstream = spawn_fake_prometheus(Some(MetricKind::ServiceCount)).await;

        let err = dispatcher(&upstream.base_url, FailurePolicy::FailFast)
            .dispatch()
            .await
            .unwrap_err();

        match err {
            DispatchError::Query { metric, source } => {
                assert_eq!(metric, MetricKind::ServiceCount);
                assert!(matches!(source, QueryError::Status { status: 503, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_isolate_keeps_healthy_metrics() {
        let upstream = spawn_fake_prometheus(Some(MetricKind::DiskIo)).await;

        let results = dispatcher(&upstream.base_url, FailurePolicy::Isolate)
            .dispatch()
            .await
            .unwrap();

        assert_eq!(results.len(), MetricKind::ALL.len());
        let failed = results.get(MetricKind::DiskIo).unwrap();
        assert_eq!(failed.status, ResponseStatus::Error);
        assert!(failed.samples().is_none());
        assert!(results.samples(MetricKind::CpuUsage).is_some());
    }

    #[tokio::test]
    async fn test_isolate_fails_when_upstream_is_down() {
        // Nothing listens on port 9 on loopback
        let err = dispatcher("http://127.0.0.1:9", FailurePolicy::Isolate)
            .dispatch()
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::AllFailed(9)));
    }

    #[test]
    fn test_policy_and_description() {
        let isolating = dispatcher("http://prom:9090/", FailurePolicy::Isolate);

        assert_eq!(isolating.policy(), FailurePolicy::Isolate);
        assert_eq!(isolating.describe(), "http://prom:9090");
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
    }

    #[test]
    fn test_from_named_skips_unknown_keys() {
        let mut named = HashMap::new();
        named.insert(
            "podCount".to_string(),
            PrometheusResponse::failure("bad_data", "x".into()),
        );
        named.insert(
            "uptime".to_string(),
            PrometheusResponse::failure("bad_data", "x".into()),
        );

        let results = RawResults::from_named(named);
        assert_eq!(results.len(), 1);
        assert!(results.get(MetricKind::PodCount).is_some());
    }
}
