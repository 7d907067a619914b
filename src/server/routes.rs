/// API Routes definition

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::websocket;
use super::AppState;

pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/prometheus", get(handlers::get_prometheus))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/query", get(handlers::run_query))
        .route("/api/queries", get(handlers::get_queries))
        .route("/api/health", get(handlers::health_check))
        .route("/ws/dashboard", get(websocket::ws_dashboard_handler))
        .with_state(state)
        // Add tracing middleware
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}
