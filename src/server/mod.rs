/// HTTP aggregation server
/// Exposes the fan-out query endpoint plus the server-side dashboard state

#[cfg(feature = "server")]
pub mod routes;

#[cfg(feature = "server")]
pub mod handlers;

#[cfg(feature = "server")]
pub mod websocket;

#[cfg(feature = "server")]
pub use routes::create_router;

#[cfg(feature = "server")]
use std::sync::Arc;

#[cfg(feature = "server")]
use tokio::sync::watch;

#[cfg(feature = "server")]
use crate::core::{DashboardState, QueryDispatcher};

/// Shared handler state
#[cfg(feature = "server")]
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<QueryDispatcher>,
    pub dashboard: watch::Receiver<DashboardState>,
}

#[cfg(feature = "server")]
pub async fn run(
    config: &crate::utils::AppConfig,
    host: String,
    port: u16,
    enable_cors: bool,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::net::SocketAddr;
    use tracing::info;

    use crate::core::{DashboardPoller, PrometheusClient};
    use crate::utils::constants::POLL_INTERVAL;

    let client = PrometheusClient::with_timeout(&config.prometheus_url, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let dispatcher = Arc::new(QueryDispatcher::new(client, config.failure_policy()));

    let policy = dispatcher.policy();

    let mut poller = DashboardPoller::new(dispatcher.clone(), POLL_INTERVAL);
    poller.start();

    let state = AppState {
        dispatcher,
        dashboard: poller.subscribe(),
    };
    let app = create_router(state, enable_cors);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    println!("📈 cluster-pulse aggregation server");
    println!("   📍 Listening:  http://{}", addr);
    println!("   🔭 Prometheus: {}", config.prometheus_url);
    println!("   ⚙️  Failures:   {:?}", policy);
    println!();
    println!("📚 API Endpoints:");
    println!("   GET  /api/prometheus        - Raw results of the named query set");
    println!("   GET  /api/dashboard         - Normalized dashboard state");
    println!("   GET  /api/query?query=EXPR  - Ad-hoc instant query");
    println!("   GET  /api/queries           - Named query set");
    println!("   GET  /api/health            - Health check");
    println!("   GET  /ws/dashboard          - WebSocket dashboard stream");
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    poller.stop();
    Ok(())
}
