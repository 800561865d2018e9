//! Ingestion service: accepts feature batches and stream samples, enqueues
//! them on the coordination bus. No persistence on the request path.

pub mod api;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::AppState;

/// Assemble the ingestion router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/stats", get(api::stats))
        .route("/ingest/batch", post(api::ingest_batch))
        .route("/ingest/stream", post(api::ingest_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use driftflow_bus::MessageBus;

    fn app() -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::new(Arc::new(MessageBus::new(8))));
        let router = build_router(state.clone());
        (state, router)
    }

    async fn post_json(router: Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (_, router) = app();
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["service"], "ingestion_api");
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn batch_ingestion_roundtrip() {
        let (state, router) = app();
        let (status, json) = post_json(
            router,
            "/ingest/batch",
            serde_json::json!({
                "features": [[0.5, -0.3, 1.2], [0.1, 0.2, 0.3]],
                "labels": [0, 1],
                "batch_id": "batch_001"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["samples_ingested"], 2);
        assert_eq!(json["batch_id"], "batch_001");
        assert_eq!(state.bus.data_queue.len(), 1);

        let batch = state.bus.data_queue.pop().unwrap();
        assert_eq!(batch.features.len(), 2);
        assert_eq!(batch.labels, Some(vec![0, 1]));
    }

    #[tokio::test]
    async fn empty_matrix_is_rejected() {
        let (state, router) = app();
        let (status, json) =
            post_json(router, "/ingest/batch", serde_json::json!({"features": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        assert_eq!(state.bus.data_queue.len(), 0);
    }

    #[tokio::test]
    async fn ragged_matrix_is_rejected() {
        let (state, router) = app();
        let (status, _) = post_json(
            router,
            "/ingest/batch",
            serde_json::json!({"features": [[1.0, 2.0], [3.0]]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.bus.data_queue.len(), 0);
    }

    #[tokio::test]
    async fn mismatched_labels_are_rejected() {
        let (_, router) = app();
        let (status, _) = post_json(
            router,
            "/ingest/batch",
            serde_json::json!({"features": [[1.0], [2.0]], "labels": [0]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dimension_is_pinned_by_first_batch() {
        let (_, router) = app();
        let (status, _) = post_json(
            router.clone(),
            "/ingest/batch",
            serde_json::json!({"features": [[1.0, 2.0]]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = post_json(
            router,
            "/ingest/batch",
            serde_json::json!({"features": [[1.0, 2.0, 3.0]]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("expected 2"));
    }

    #[tokio::test]
    async fn stream_sample_lands_on_stream_queue() {
        let (state, router) = app();
        let (status, json) = post_json(
            router,
            "/ingest/stream",
            serde_json::json!({"features": [0.5, -0.3], "label": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(state.bus.stream_queue.len(), 1);
        assert_eq!(state.bus.data_queue.len(), 0);

        let sample = state.bus.stream_queue.pop().unwrap();
        assert_eq!(sample.label, Some(1));
    }

    #[tokio::test]
    async fn stats_reports_queue_depths() {
        let (state, router) = app();
        state
            .bus
            .stream_queue
            .push(driftflow_core::types::StreamSample {
                features: vec![1.0],
                label: None,
                timestamp: chrono::Utc::now(),
            })
            .unwrap();

        let response = router
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["batch_queue_size"], 0);
        assert_eq!(json["stream_queue_size"], 1);
    }

    #[tokio::test]
    async fn full_queue_surfaces_backpressure() {
        let (state, router) = app();
        // Capacity is 8 in this fixture.
        for _ in 0..8 {
            state
                .bus
                .data_queue
                .push(driftflow_core::types::Batch {
                    features: vec![vec![1.0]],
                    labels: None,
                    batch_id: None,
                    timestamp: chrono::Utc::now(),
                })
                .unwrap();
        }

        let (status, json) = post_json(
            router,
            "/ingest/batch",
            serde_json::json!({"features": [[1.0]]}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["message"].as_str().unwrap().contains("data_queue"));
    }
}
