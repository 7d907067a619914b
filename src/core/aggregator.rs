/// Client for a running aggregation server
///
/// Fetches the combined `/api/prometheus` body so a dashboard can poll a
/// `cluster-pulse serve` instance instead of Prometheus directly.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use super::dispatcher::{DispatchError, MetricsSource, RawResults};
use super::prometheus::{PrometheusResponse, QueryError};
use crate::utils::constants::AGGREGATE_PATH;

pub struct AggregatorClient {
    client: Client,
    url: String,
}

impl AggregatorClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), AGGREGATE_PATH),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_named(&self) -> Result<HashMap<String, PrometheusResponse>, QueryError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl MetricsSource for AggregatorClient {
    async fn fetch(&self) -> Result<RawResults, DispatchError> {
        let named = self.fetch_named().await.map_err(DispatchError::Aggregator)?;
        Ok(RawResults::from_named(named))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
