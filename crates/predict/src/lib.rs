//! Prediction service: serves classifications from the deployed model,
//! persists an audit record per row, and feeds served traffic to the
//! drift monitor through the prediction buffer.

pub mod api;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::{ActiveModel, AppState};

/// Assemble the prediction router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/predict", post(api::predict))
        .route("/predict/batch", post(api::predict_batch))
        .route("/reload_model", post(api::reload_model))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Watch the bus for `model_update` notifications and reload the handle
/// when the promoted version differs from the one being served.
pub async fn run_model_update_watcher(
    state: Arc<AppState>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let Some(update) = state.bus.model_update() else {
            continue;
        };
        let serving = state.loaded_model().await.map(|m| m.version.clone());
        if serving.as_deref() == Some(update.version.as_str()) {
            continue;
        }
        tracing::info!(version = %update.version, "model update observed — reloading");
        if let Err(e) = state.reload_model().await {
            tracing::warn!(error = %e, "model reload failed");
        }
    }
    tracing::info!("model update watcher stopped");
}
