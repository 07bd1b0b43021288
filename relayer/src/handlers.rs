//! Relayer HTTP surface: a minimal health/metrics/status API (spec.md
//! §2's component H, "cross-cut; no business logic"). Not named in
//! spec.md §6.1 (that table is the Attester Service's API), but carried
//! here the same way the teacher always exposes liveness/metrics
//! endpoints on every service it runs.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bridge_relayer::fetcher::AttestationFetcher;
use bridge_relayer::metrics::RelayerMetrics;
use serde_json::json;
use tracing::instrument;

pub struct RelayerApp {
    pub fetcher: Arc<AttestationFetcher>,
    pub metrics: Arc<RelayerMetrics>,
    pub started_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

pub fn routes(app: Arc<RelayerApp>) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/status", get(get_status))
        .with_state(app)
}

#[instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    format!("Hello from {}!", env!("CARGO_PKG_NAME"))
}

#[instrument(skip_all)]
async fn get_health(State(app): State<Arc<RelayerApp>>) -> impl IntoResponse {
    let sources = app.fetcher.health_snapshot().await;
    let any_healthy = sources.iter().any(|(_, h)| h.consecutive_failures == 0);
    let status = if sources.is_empty() {
        "unhealthy"
    } else if any_healthy {
        "healthy"
    } else {
        "degraded"
    };
    let sources_json: Vec<_> = sources
        .into_iter()
        .map(|(url, health)| {
            json!({
                "url": url.to_string(),
                "consecutiveFailures": health.consecutive_failures,
                "lastError": health.last_error,
                "lastSuccessMs": health.last_success_ms,
            })
        })
        .collect();
    Json(json!({
        "status": status,
        "uptimeMs": now_ms().saturating_sub(app.started_at_ms),
        "sources": sources_json,
    }))
}

#[instrument(skip_all)]
async fn get_metrics(State(app): State<Arc<RelayerApp>>) -> impl IntoResponse {
    ([("content-type", "text/plain; version=0.0.4")], app.metrics.encode())
}

#[instrument(skip_all)]
async fn get_status(State(app): State<Arc<RelayerApp>>) -> impl IntoResponse {
    let sources = app.fetcher.health_snapshot().await;
    let sources_json: Vec<_> = sources
        .into_iter()
        .map(|(url, health)| {
            json!({
                "url": url.to_string(),
                "consecutiveFailures": health.consecutive_failures,
            })
        })
        .collect();
    Json(json!({ "sources": sources_json }))
}
