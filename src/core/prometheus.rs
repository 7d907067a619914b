/// Prometheus HTTP API client
///
/// Issues instant queries against `{base_url}/api/v1/query` and decodes the
/// standard `{status, data: {resultType, result}}` envelope.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::utils::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, PROMETHEUS_QUERY_PATH};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Vector,
    Matrix,
    Scalar,
    String,
}

/// `[<unix seconds>, "<decimal string>"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleValue(pub f64, pub String);

impl SampleValue {
    pub fn timestamp(&self) -> f64 {
        self.0
    }

    pub fn raw(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrometheusSample {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SampleValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<SampleValue>>,
}

impl PrometheusSample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric.get(name).map(String::as_str)
    }
}

/// `result` is an array of samples for vector/matrix and a bare value pair
/// for scalar/string result types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Samples(Vec<PrometheusSample>),
    Single(SampleValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusData {
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    #[serde(default)]
    pub result: Option<QueryResult>,
}

impl PrometheusData {
    /// Samples of the result, with a scalar/string result viewed as a single
    /// unlabelled sample. `None` when the result array is absent.
    pub fn samples(&self) -> Option<Cow<'_, [PrometheusSample]>> {
        match self.result.as_ref()? {
            QueryResult::Samples(samples) => Some(Cow::Borrowed(samples.as_slice())),
            QueryResult::Single(value) => Some(Cow::Owned(vec![PrometheusSample {
                metric: BTreeMap::new(),
                value: Some(value.clone()),
                values: None,
            }])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PrometheusData>,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PrometheusResponse {
    pub fn success(result_type: ResultType, samples: Vec<PrometheusSample>) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(PrometheusData {
                result_type,
                result: Some(QueryResult::Samples(samples)),
            }),
            error_type: None,
            error: None,
        }
    }

    /// Error envelope in the shape Prometheus itself uses
    pub fn failure(error_type: &str, message: String) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: None,
            error_type: Some(error_type.to_string()),
            error: Some(message),
        }
    }

    pub fn samples(&self) -> Option<Cow<'_, [PrometheusSample]>> {
        self.data.as_ref().and_then(PrometheusData::samples)
    }
}

#[derive(Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: &str) -> Result<Self, QueryError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cluster-pulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for an instant query, with the expression
    /// percent-encoded.
    pub fn query_url(&self, expression: &str) -> String {
        format!(
            "{}{}?query={}",
            self.base_url,
            PROMETHEUS_QUERY_PATH,
            urlencoding::encode(expression)
        )
    }

    /// Run an instant query. Any non-2xx status is an error.
    pub async fn query(&self, expression: &str) -> Result<PrometheusResponse, QueryError> {
        let url = self.query_url(expression);
        debug!(%url, "querying prometheus");

        let response = self.client.get(&url).send().await?;
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

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(labels: &[(&str, &str)], ts: f64, value: &str) -> PrometheusSample {
        PrometheusSample {
            metric: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value: Some(SampleValue(ts, value.to_string())),
            values: None,
        }
    }

    #[test]
    fn test_query_url_is_percent_encoded() {
        let client = PrometheusClient::new("http://prometheus:9090/").unwrap();
        let url = client.query_url(r#"count(kube_pod_info{ns="a b"}) by (node)"#);

        assert_eq!(
            url,
            "http://prometheus:9090/api/v1/query?query=count%28kube_pod_info%7Bns%3D%22a%20b%22%7D%29%20by%20%28node%29"
        );
    }

    #[test]
    fn test_decode_vector_response() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"pod": "api-7f9"}, "value": [1700000000.5, "0.25"]},
                    {"metric": {}, "value": [1700000000.5, "NaN"]}
                ]
            }
        }"#;

        let response: PrometheusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status, ResponseStatus::Success);

        let samples = response.samples().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label("pod"), Some("api-7f9"));
        assert_eq!(samples[0].value.as_ref().unwrap().raw(), "0.25");
        assert_eq!(samples[1].value.as_ref().unwrap().timestamp(), 1700000000.5);
    }

    #[test]
    fn test_decode_scalar_response() {
        let body = r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000,"0.75"]}}"#;

        let response: PrometheusResponse = serde_json::from_str(body).unwrap();
        let samples = response.samples().unwrap();

        assert_eq!(samples.len(), 1);
        assert!(samples[0].metric.is_empty());
        assert_eq!(samples[0].value.as_ref().unwrap().raw(), "0.75");
    }

    #[test]
    fn test_decode_error_envelope() {
        let body = r#"{"status":"error","errorType":"bad_data","error":"parse error at char 4"}"#;

        let response: PrometheusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.samples().is_none());
        assert_eq!(response.error.as_deref(), Some("parse error at char 4"));
    }

    #[test]
    fn test_missing_result_has_no_samples() {
        let body = r#"{"status":"success","data":{"resultType":"vector"}}"#;

        let response: PrometheusResponse = serde_json::from_str(body).unwrap();
        assert!(response.samples().is_none());
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let response = PrometheusResponse::success(
            ResultType::Vector,
            vec![sample(&[("node", "n1")], 1.0, "3")],
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["data"]["resultType"], "vector");
        assert_eq!(json["data"]["result"][0]["value"][1], "3");
        assert!(json.get("error").is_none());
        assert!(json["data"]["result"][0].get("values").is_none());
    }
}
