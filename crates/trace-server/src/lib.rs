//! The HTTP surface (spec.md §6): `Push`, trace-by-id, search, and the
//! stateless worker-offload variant of search — nothing else. No OTLP/
//! Jaeger/Zipkin receivers and no auth/tenant-header middleware (spec.md §1
//! non-goals); grounded on the Rust port reference's `axum`/`tower`/
//! `tower-http` dependency set, since the teacher's own HTTP surface is
//! pgwire/SQL and has nothing to imitate here.

mod dto;
mod error;
mod push;
mod search;
mod state;
mod traces;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Builds the full router: `POST /api/push/:tenant`, `GET
/// /api/traces/:hex_trace_id`, `GET /api/search` (doubles as the
/// worker-offload endpoint when the block-targeting parameters are
/// present), plus a bare liveness check.
pub fn build_router(state: AppState) -> Router {
    let max_push_body_bytes = state.config.max_push_body_bytes;

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/api/push/:tenant",
            post(push::push).layer(DefaultBodyLimit::max(max_push_body_bytes)),
        )
        .route("/api/traces/:hex_trace_id", get(traces::get_trace_by_id))
        .route("/api/search", get(search::search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use trace_config::{AccumulatorConfig, QueryConfig, ServerConfig};
    use trace_ingester::TraceAccumulator;
    use trace_objectstore::{LocalDisk, ObjectStore};
    use trace_query::Coordinator;
    use trace_wal::Wal;

    async fn test_state(dir: &std::path::Path) -> AppState {
        let wal_dir = dir.join("wal");
        let wal = Arc::new(Wal::open(&wal_dir, 16 * 1024 * 1024).await.unwrap());
        let overrides = Arc::new(trace_config::OverrideTable::new(
            AccumulatorConfig::default(),
            [(trace_config::WILDCARD.to_string(), Default::default())].into_iter().collect(),
        ));
        let (accumulator, _receiver) = TraceAccumulator::new(AccumulatorConfig::default(), overrides, wal);

        let store: Arc<dyn ObjectStore> = Arc::new(LocalDisk::new(dir.join("objects")));
        let coordinator = Arc::new(Coordinator::new(store, QueryConfig::default()));

        AppState { accumulator, coordinator, config: ServerConfig::default() }
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(dir.path()).await);
        let response = router
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trace_by_id_404s_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(dir.path()).await);
        let response = router
            .oneshot(Request::builder().uri(format!("/api/traces/{}", "ab".repeat(16))).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_hex_trace_id_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(dir.path()).await);
        let response = router
            .oneshot(Request::builder().uri("/api/traces/not-hex").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn push_accepts_a_valid_batch() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(test_state(dir.path()).await);
        let body = serde_json::json!({
            "resource_spans": [{
                "resource": { "service_name": "api" },
                "scope_spans": [{
                    "scope": {},
                    "spans": [{
                        "trace_id": [1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                        "span_id": [1,0,0,0,0,0,0,0],
                        "parent_span_id": [0,0,0,0,0,0,0,0],
                        "name": "/hi",
                        "kind": "Server",
                        "status": "Ok",
                        "status_message": "",
                        "start_time_unix_nano": 0,
                        "end_time_unix_nano": 1,
                        "trace_state": "",
                        "http_method": null,
                        "http_url": null,
                        "http_status_code": null,
                        "attrs": [],
                        "events": [],
                        "links": [],
                        "dropped_attributes_count": 0,
                        "dropped_events_count": 0,
                        "dropped_links_count": 0
                    }]
                }]
            }]
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/push/tenant-a")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
