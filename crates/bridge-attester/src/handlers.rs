//! Attester Service HTTP API (spec.md §4.5, §6.1), built on `axum` the way
//! `src/handlers.rs` builds the teacher's facilitator endpoints: plain
//! handler functions taking a `State` extractor, `#[instrument(skip_all)]`
//! spans, and a `routes()` function assembling the `Router`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bridge_types::attestation::{Attestation, ObservedStatus, PartialSignature, SignatureScheme};
use bridge_types::domain::Domain;
use bridge_types::message::MessageId;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::service::AttesterService;
use crate::store::now_ms;

pub fn routes(service: Arc<AttesterService>) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/attestation/{message_id_hex}", get(get_attestation_by_id))
        .route("/attestation/{source_domain}/{nonce}", get(get_attestation_by_nonce))
        .route("/attestations/ready", get(get_attestations_ready))
        .route("/attestation/{message_id_hex}/relayed", post(post_mark_relayed))
        .route("/stats", get(get_stats))
        .route("/status", get(get_status))
        .with_state(service)
}

#[instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    (StatusCode::OK, format!("Hello from {}!", env!("CARGO_PKG_NAME")))
}

#[instrument(skip_all)]
async fn get_health(State(service): State<Arc<AttesterService>>) -> impl IntoResponse {
    let snapshot = service.health_snapshot().await;
    Json(json!({
        "status": snapshot.status,
        "uptimeMs": snapshot.uptime_ms,
        "adapters": snapshot.adapters,
        "attestations": snapshot.attestations,
    }))
}

#[instrument(skip_all)]
async fn get_metrics(State(service): State<Arc<AttesterService>>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        service.metrics().encode(),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureView {
    attester_id: u8,
    scheme: SignatureScheme,
    signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttestationView {
    message_hash: String,
    message: String,
    signatures: Vec<SignatureView>,
    signature_count: usize,
    threshold_met: bool,
    status: ObservedStatus,
    // Not named in spec.md §6.1's response table, but the relayer's
    // Attestation Fetcher (spec.md §4.6) needs these to route a fetched
    // attestation to the right destination submitter and to index it by
    // nonce; they are already part of the Attestation data model (§3).
    source_domain: u32,
    destination_domain: u32,
    nonce: u64,
}

impl AttestationView {
    fn from_attestation(a: &Attestation, threshold: usize, now_ms: u64) -> Self {
        AttestationView {
            message_hash: a.message_id.to_hex(),
            message: format!("0x{}", hex::encode(&a.message_bytes)),
            signatures: a
                .signatures_ordered()
                .into_iter()
                .map(SignatureView::from_partial)
                .collect(),
            signature_count: a.signatures.len(),
            threshold_met: a.signatures.len() >= threshold,
            status: a.status_at(now_ms),
            source_domain: a.source_domain.0,
            destination_domain: a.destination_domain.0,
            nonce: a.nonce,
        }
    }
}

impl SignatureView {
    fn from_partial(s: PartialSignature) -> Self {
        SignatureView {
            attester_id: s.attester_id,
            scheme: s.scheme,
            signature: format!("0x{}", hex::encode(&s.signature)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("malformed message_id: {0}")]
    MalformedId(String),
    #[error("attestation not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MalformedId(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `GET /attestation/{message_id_hex}` (spec.md §6.1).
#[instrument(skip(service))]
async fn get_attestation_by_id(
    State(service): State<Arc<AttesterService>>,
    Path(message_id_hex): Path<String>,
) -> Result<Json<AttestationView>, ApiError> {
    let message_id =
        MessageId::from_hex(&message_id_hex).map_err(|e| ApiError::MalformedId(e.to_string()))?;
    let attestation = service.store().get(message_id).await.ok_or(ApiError::NotFound)?;
    Ok(Json(AttestationView::from_attestation(
        &attestation,
        service.store().threshold(),
        now_ms(),
    )))
}

/// `GET /attestation/{source_domain}/{nonce}` (spec.md §6.1). Axum's
/// `Path<(u32, u64)>` extraction itself returns `400` for a malformed or
/// negative component before this handler ever runs.
#[instrument(skip(service))]
async fn get_attestation_by_nonce(
    State(service): State<Arc<AttesterService>>,
    Path((source_domain, nonce)): Path<(u32, u64)>,
) -> Result<Json<AttestationView>, ApiError> {
    let attestation = service
        .store()
        .get_by_nonce(Domain(source_domain), nonce)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(AttestationView::from_attestation(
        &attestation,
        service.store().threshold(),
        now_ms(),
    )))
}

#[instrument(skip_all)]
async fn get_attestations_ready(State(service): State<Arc<AttesterService>>) -> impl IntoResponse {
    let ready = service.store().list_ready().await;
    let threshold = service.store().threshold();
    let now = now_ms();
    let views: Vec<AttestationView> = ready
        .iter()
        .map(|a| AttestationView::from_attestation(a, threshold, now))
        .collect();
    Json(json!({ "count": views.len(), "attestations": views }))
}

/// `POST /attestation/{message_id_hex}/relayed` — not in spec.md §6.1's
/// table, which only names read endpoints; added so the relayer's
/// destination submitter has a concrete way to perform the best-effort
/// `mark_relayed` notification spec.md §4.7 calls for across process
/// boundaries. Idempotent, like the store method it wraps.
#[instrument(skip(service))]
async fn post_mark_relayed(
    State(service): State<Arc<AttesterService>>,
    Path(message_id_hex): Path<String>,
) -> Result<StatusCode, ApiError> {
    let message_id =
        MessageId::from_hex(&message_id_hex).map_err(|e| ApiError::MalformedId(e.to_string()))?;
    service.store().get(message_id).await.ok_or(ApiError::NotFound)?;
    service.store().mark_relayed(message_id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
async fn get_stats(State(service): State<Arc<AttesterService>>) -> impl IntoResponse {
    let snapshot = service.health_snapshot().await;
    Json(json!({
        "attestations": snapshot.attestations,
        "adapters": snapshot.adapters,
        "uptimeMs": snapshot.uptime_ms,
    }))
}

#[instrument(skip_all)]
async fn get_status(State(service): State<Arc<AttesterService>>) -> impl IntoResponse {
    let snapshot = service.health_snapshot().await;
    Json(json!({
        "status": snapshot.status,
        "adapters": snapshot.adapters,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_types::attestation::{AttesterIdentity, PartialSignature};
    use bridge_types::domain::Domain;
    use http_body_util::BodyExt;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::metrics::Metrics;
    use crate::signer::Signer;
    use crate::store::AttestationStore;

    fn test_service() -> Arc<AttesterService> {
        let identity = AttesterIdentity {
            id: 1,
            ecdsa_address: [0u8; 20],
            sr25519_public: [0u8; 32],
        };
        AttesterService::new(
            identity,
            Signer::new(None, None, 1),
            Arc::new(AttestationStore::new(2)),
            Arc::new(Metrics::new()),
            Vec::new(),
            60_000,
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_unhealthy_with_no_adapters() {
        let app = routes(test_service());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["attestations"]["pending"], 0);
    }

    #[tokio::test]
    async fn unknown_attestation_is_404() {
        let app = routes(test_service());
        let id = MessageId([0xAB; 32]).to_hex();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/attestation/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_message_id_is_400() {
        let app = routes(test_service());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/attestation/not-hex")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ready_attestation_is_served_by_id_and_listed() {
        let service = test_service();
        let id = MessageId([7u8; 32]);
        service
            .store()
            .ensure(id, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 5)
            .await
            .unwrap();
        for attester_id in [1, 2] {
            service
                .store()
                .add_signature(
                    id,
                    PartialSignature {
                        attester_id,
                        scheme: bridge_types::attestation::SignatureScheme::Sr25519,
                        signature: vec![0u8; 64],
                        signed_at_ms: 0,
                    },
                )
                .await;
        }

        let app = routes(service);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/attestation/{}", id.to_hex()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["thresholdMet"], true);
        assert_eq!(body["signatureCount"], 2);

        let response = app
            .oneshot(Request::builder().uri("/attestations/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn mark_relayed_is_idempotent_over_http() {
        let service = test_service();
        let id = MessageId([8u8; 32]);
        service
            .store()
            .ensure(id, vec![0u8; 128], Domain::EVM_ETHEREUM, Domain::SUBSTRATE, 9)
            .await
            .unwrap();

        let app = routes(service);
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/attestation/{}/relayed", id.to_hex()))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn metrics_are_served_as_prometheus_text() {
        let app = routes(test_service());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));
    }
}
