//! Fake Prometheus server for tests

#[cfg(feature = "server")]
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
#[cfg(feature = "server")]
use std::collections::HashMap;
#[cfg(feature = "server")]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "server")]
use std::sync::Arc;

use super::dispatcher::RawResults;
use super::prometheus::{PrometheusResponse, PrometheusSample, ResultType, SampleValue};
use super::queries::{MetricKind, MetricShape};

pub(crate) const SAMPLE_TS: f64 = 1_700_000_000.5;

#[cfg(feature = "server")]
pub(crate) struct FakePrometheus {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

#[cfg(feature = "server")]
#[derive(Clone)]
struct FakeState {
    failing: Option<MetricKind>,
    hits: Arc<AtomicUsize>,
}

fn labelled(label: &str, name: &str, value: &str) -> PrometheusSample {
    PrometheusSample {
        metric: [(label.to_string(), name.to_string())].into_iter().collect(),
        value: Some(SampleValue(SAMPLE_TS, value.to_string())),
        values: None,
    }
}

/// Canned, well-formed response for each metric kind
pub(crate) fn canned_response(kind: MetricKind) -> PrometheusResponse {
    let samples = match (kind, kind.shape()) {
        (_, MetricShape::Series) => vec![
            labelled("instance", "node-1:9100", "0.42"),
            labelled("instance", "node-2:9100", "0.17"),
        ],
        (MetricKind::PodCount, _) => vec![
            labelled("node", "node-1", "3"),
            labelled("node", "node-2", "5"),
            labelled("node", "node-3", "2"),
        ],
        (MetricKind::TopPodsCpu, _) => vec![
            labelled("pod", "podA", "0.9"),
            labelled("pod", "podB", "0.5"),
        ],
        (MetricKind::TopPodsMemory, _) => vec![
            labelled("pod", "podC", "734003200"),
            labelled("pod", "podA", "52428800"),
        ],
        (MetricKind::ClusterHealth, _) => vec![PrometheusSample {
            value: Some(SampleValue(SAMPLE_TS, "0.75".to_string())),
            ..Default::default()
        }],
        _ => vec![PrometheusSample {
            value: Some(SampleValue(SAMPLE_TS, "12".to_string())),
            ..Default::default()
        }],
    };

    PrometheusResponse::success(ResultType::Vector, samples)
}

pub(crate) fn canned_results() -> RawResults {
    MetricKind::ALL
        .into_iter()
        .map(|kind| (kind, canned_response(kind)))
        .collect()
}

#[cfg(feature = "server")]
async fn handle_query(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let expression = params.get("query").cloned().unwrap_or_default();
    let kind = MetricKind::ALL
        .into_iter()
        .find(|k| k.expression() == expression);

    match kind {
        Some(k) if Some(k) == state.failing => {
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable").into_response()
        }
        Some(k) => Json(canned_response(k)).into_response(),
        None if expression == "up" => Json(PrometheusResponse::success(
            ResultType::Vector,
            vec![labelled("job", "node-exporter", "1")],
        ))
        .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(PrometheusResponse::failure(
                "bad_data",
                format!("unknown expression {}", expression),
            )),
        )
            .into_response(),
    }
}

#[cfg(feature = "server")]
/// Serve canned responses on an ephemeral loopback port. Queries for
/// `failing` answer 503.
pub(crate) async fn spawn_fake_prometheus(failing: Option<MetricKind>) -> FakePrometheus {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = FakeState {
        failing,
        hits: Arc::clone(&hits),
    };

    let app = Router::new()
        .route("/api/v1/query", get(handle_query))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakePrometheus {
        base_url: format!("http://{}", addr),
        hits,
    }
}
