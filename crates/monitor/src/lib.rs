//! Drift monitor: periodically samples served traffic, tests it against the
//! reference distribution, and enqueues retraining when drift is detected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use driftflow_bus::MessageBus;
use driftflow_core::config::DriftConfig;
use driftflow_core::types::{ActionTaken, DriftEventRecord, FeatureVector, RetrainJob, TriggerReason};
use driftflow_core::PipelineError;
use driftflow_detect::DriftDetector;
use driftflow_store::PipelineStore;

/// Back-off after a failed check iteration.
const ERROR_BACKOFF_SECS: u64 = 60;

/// What a single monitor tick did, for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No reference dataset available yet.
    NoReference,
    /// Fewer than `min_samples` rows drained; check skipped.
    Insufficient { rows: usize },
    /// A drift check ran and was persisted.
    Checked { drift_detected: bool, drift_score: f64 },
}

pub struct DriftMonitor {
    bus: Arc<MessageBus>,
    store: Arc<dyn PipelineStore>,
    config: DriftConfig,
    detector: Option<DriftDetector>,
}

impl DriftMonitor {
    pub fn new(bus: Arc<MessageBus>, store: Arc<dyn PipelineStore>, config: DriftConfig) -> Self {
        Self {
            bus,
            store,
            config,
            detector: None,
        }
    }

    /// Anchor the detector to a reference matrix.
    pub fn set_reference(&mut self, reference: &[FeatureVector]) -> Result<(), PipelineError> {
        let detector = DriftDetector::new(self.config.threshold, reference)?;
        info!(
            rows = detector.reference_len(),
            features = detector.n_features(),
            "reference data set"
        );
        self.detector = Some(detector);
        Ok(())
    }

    /// Load the reference from the bus cache if not yet anchored.
    fn ensure_reference(&mut self) -> bool {
        if self.detector.is_some() {
            return true;
        }
        match self.bus.reference_data() {
            Some(matrix) => match self.set_reference(&matrix) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "cached reference data is unusable");
                    false
                }
            },
            None => {
                warn!("no reference data available — skipping drift check");
                false
            }
        }
    }

    /// One drift check: drain, test, persist, and trigger retraining.
    pub async fn tick(&mut self) -> Result<TickOutcome, PipelineError> {
        if !self.ensure_reference() {
            return Ok(TickOutcome::NoReference);
        }

        // Drain up to window_size buffer records; a record carries every
        // row of one prediction call. Skipped drains are discarded —
        // drift detection is best-effort over served traffic.
        let records = self.bus.prediction_buffer.drain(self.config.window_size);
        let mut current: Vec<FeatureVector> = Vec::new();
        for record in records {
            current.extend(record.features);
        }

        if current.len() < self.config.min_samples {
            debug!(rows = current.len(), "insufficient data for drift check");
            return Ok(TickOutcome::Insufficient { rows: current.len() });
        }

        info!(rows = current.len(), "checking drift");
        let detector = self.detector.as_ref().expect("reference ensured above");
        let report = detector.detect(&current)?;

        let drift_detected = report.overall_drift;
        let drift_score = report.drift_score();
        let action = if drift_detected {
            ActionTaken::RetrainingTriggered
        } else {
            ActionTaken::None
        };

        self.store
            .log_drift_event(&DriftEventRecord {
                timestamp: Utc::now(),
                drift_detected,
                drift_score,
                affected_features: report.affected_features(),
                drift_metrics: report.to_metrics_json(),
                action_taken: action,
            })
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        if drift_detected {
            warn!(
                score = drift_score,
                affected = report.summary.features_with_drift,
                "drift detected — triggering retraining"
            );
            let job = RetrainJob {
                trigger: TriggerReason::DriftDetected,
                drift_metrics: Some(report.to_metrics_json()),
                timestamp: Utc::now(),
            };
            if let Err(e) = self.bus.retraining_queue.push(job) {
                warn!(error = %e, "retraining queue full — trigger dropped");
            }
        } else {
            info!(score = drift_score, "no drift detected");
        }

        Ok(TickOutcome::Checked {
            drift_detected,
            drift_score,
        })
    }

    /// Periodic loop. Per-iteration failures are logged and backed off;
    /// the monitor never crashes.
    pub async fn run(mut self, stop: Arc<AtomicBool>) {
        info!(
            interval = self.config.check_interval_secs,
            window = self.config.window_size,
            "drift monitor started"
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.check_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "drift check failed");
                tokio::time::sleep(Duration::from_secs(ERROR_BACKOFF_SECS)).await;
            }
        }
        info!("drift monitor stopped");
    }
}

// ── Health endpoint ───────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "drift_monitor",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Minimal router for the monitor's service port.
pub fn build_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
}
