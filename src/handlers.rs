use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::PipelineMode;
use crate::metrics::{Metrics, MetricsSnapshot};

pub struct AppState {
    pub mode: PipelineMode,
    pub run_key: String,
    pub total_items: usize,
    pub metrics: Arc<Metrics>,
    pub started_at: chrono::DateTime<Utc>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the read-only status endpoints until the process exits. Bind
/// failures are logged and the run carries on without them.
pub async fn serve(state: Arc<AppState>, port: u16) {
    let addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Status server disabled, cannot bind {}: {}", addr, e);
            return;
        }
    };
    info!("Status server listening on {}", addr);
    if let Err(e) = axum::serve(listener, router(state)).await {
        warn!("Status server stopped: {}", e);
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    mode: String,
    run_key: String,
    uptime_secs: i64,
    total_items: usize,
    #[serde(flatten)]
    counters: MetricsSnapshot,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.mode.to_string(),
        run_key: state.run_key.clone(),
        uptime_secs: uptime,
        total_items: state.total_items,
        counters: state.metrics.snapshot(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let body = state.metrics.render_prometheus();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
