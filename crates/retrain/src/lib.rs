//! Retraining worker: consumes retrain jobs, fits a fresh model on queued
//! training data, registers the artifact, and promotes it atomically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use driftflow_bus::MessageBus;
use driftflow_core::config::ModelConfig;
use driftflow_core::types::{
    FeatureVector, JobStatus, ModelRegistryEntry, ModelStatus, RetrainJob, TrainingJobRecord,
};
use driftflow_model::{
    artifact_path, save_artifact, LogSink, ModelTrainer, RunStatus, TrackingSink, TrainedModel,
};
use driftflow_store::PipelineStore;

/// Queue poll interval when idle.
const POLL_INTERVAL_SECS: u64 = 10;

/// Terminal state of one processed job, for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        job_id: String,
        model_version: String,
    },
    Failed {
        job_id: String,
        reason: String,
    },
}

pub struct RetrainingWorker {
    bus: Arc<MessageBus>,
    store: Arc<dyn PipelineStore>,
    tracking: Arc<dyn TrackingSink>,
    model_config: ModelConfig,
    /// Max data-queue batches drained per job.
    window_size: usize,
}

impl RetrainingWorker {
    pub fn new(
        bus: Arc<MessageBus>,
        store: Arc<dyn PipelineStore>,
        model_config: ModelConfig,
        window_size: usize,
    ) -> Self {
        Self {
            bus,
            store,
            tracking: Arc::new(LogSink::new("drift_detection_pipeline")),
            model_config,
            window_size,
        }
    }

    pub fn with_tracking(mut self, tracking: Arc<dyn TrackingSink>) -> Self {
        self.tracking = tracking;
        self
    }

    /// Drain labelled batches into parallel (X, y) arrays. Batches without
    /// labels carry no supervision and are skipped.
    fn collect_training_data(&self) -> (Vec<FeatureVector>, Vec<i64>) {
        let batches = self.bus.data_queue.drain(self.window_size);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for batch in batches {
            match batch.labels {
                Some(labels) if labels.len() == batch.features.len() => {
                    x.extend(batch.features);
                    y.extend(labels);
                }
                Some(_) => {
                    warn!(batch_id = batch.batch_id.as_deref(), "batch labels misaligned — skipped");
                }
                None => {
                    tracing::debug!(batch_id = batch.batch_id.as_deref(), "unlabelled batch skipped");
                }
            }
        }
        (x, y)
    }

    async fn mark_failed(&self, job_id: &str, job: &RetrainJob, reason: String) -> JobOutcome {
        error!(job_id, %reason, "retraining failed");
        let record = TrainingJobRecord {
            timestamp: Utc::now(),
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
            metrics: None,
            model_version: None,
            trigger_reason: Some(job.trigger),
            tracking_run_id: None,
        };
        if let Err(e) = self.store.log_training_job(&record).await {
            error!(job_id, error = %e, "failed to record job failure");
        }
        JobOutcome::Failed {
            job_id: job_id.to_string(),
            reason,
        }
    }

    /// Run one retraining job end to end.
    pub async fn process_job(&self, job: &RetrainJob) -> JobOutcome {
        let job_id = Uuid::new_v4().to_string();
        info!(job_id = %job_id, trigger = %job.trigger, "processing retraining job");

        let started = TrainingJobRecord {
            timestamp: Utc::now(),
            job_id: job_id.clone(),
            status: JobStatus::Started,
            metrics: None,
            model_version: None,
            trigger_reason: Some(job.trigger),
            tracking_run_id: None,
        };
        if let Err(e) = self.store.log_training_job(&started).await {
            return JobOutcome::Failed {
                job_id,
                reason: format!("store unavailable: {e}"),
            };
        }

        let (x, y) = self.collect_training_data();
        if x.is_empty() {
            return self
                .mark_failed(&job_id, job, "no labelled training data available".to_string())
                .await;
        }

        let run_id = self.tracking.start_run(&format!("retrain_{job_id}"));
        self.tracking.log_params(
            &run_id,
            &serde_json::json!({
                "trigger": job.trigger.to_string(),
                "samples": x.len(),
                "job_id": job_id,
            }),
        );

        // Training is CPU-bound; keep it off the async worker thread.
        let config = self.model_config.clone();
        let train_x = x.clone();
        let train_y = y.clone();
        let fitted = tokio::task::spawn_blocking(move || {
            ModelTrainer::new(config).fit(&train_x, &train_y)
        })
        .await;

        let trained: TrainedModel = match fitted {
            Ok(Ok(trained)) => trained,
            Ok(Err(e)) => {
                self.tracking.end_run(&run_id, RunStatus::Failed);
                return self.mark_failed(&job_id, job, format!("training error: {e}")).await;
            }
            Err(e) => {
                self.tracking.end_run(&run_id, RunStatus::Failed);
                return self.mark_failed(&job_id, job, format!("training task panicked: {e}")).await;
            }
        };

        let version = trained.model_version.clone();
        let path = artifact_path(&self.model_config.models_dir, &version);
        if let Err(e) = save_artifact(&path, &trained.model, &version) {
            self.tracking.end_run(&run_id, RunStatus::Failed);
            return self.mark_failed(&job_id, job, format!("artifact write failed: {e}")).await;
        }

        let entry = ModelRegistryEntry {
            timestamp: Utc::now(),
            model_version: version.clone(),
            model_path: path.to_string_lossy().into_owned(),
            metrics: serde_json::to_value(&trained.metrics).unwrap_or(serde_json::Value::Null),
            status: ModelStatus::Trained,
            deployed: false,
        };
        if let Err(e) = self.store.register_model(&entry).await {
            self.tracking.end_run(&run_id, RunStatus::Failed);
            return self.mark_failed(&job_id, job, format!("registry insert failed: {e}")).await;
        }

        // Promotion demotes the previous deployment in the same transaction,
        // closing the feedback loop without an operator step.
        if let Err(e) = self.store.deploy_model(&version).await {
            self.tracking.end_run(&run_id, RunStatus::Failed);
            return self.mark_failed(&job_id, job, format!("promotion failed: {e}")).await;
        }

        let completed = TrainingJobRecord {
            timestamp: Utc::now(),
            job_id: job_id.clone(),
            status: JobStatus::Completed,
            metrics: Some(trained.metrics.clone()),
            model_version: Some(version.clone()),
            trigger_reason: Some(job.trigger),
            tracking_run_id: Some(run_id.clone()),
        };
        if let Err(e) = self.store.log_training_job(&completed).await {
            error!(job_id = %job_id, error = %e, "failed to record job completion");
        }

        self.tracking.log_metrics(&run_id, &trained.metrics);
        self.tracking.end_run(&run_id, RunStatus::Finished);

        // Notify the prediction service and re-anchor the drift reference
        // to the distribution the new model was trained on.
        self.bus.publish_model_update(&version);
        self.bus.set_reference_data(&x);

        info!(
            job_id = %job_id,
            version = %version,
            accuracy = trained.metrics.accuracy,
            "retraining completed"
        );
        JobOutcome::Completed {
            job_id,
            model_version: version,
        }
    }

    /// Worker loop: poll the retraining queue, back off while idle.
    pub async fn run(self, stop: Arc<AtomicBool>) {
        info!(poll_secs = POLL_INTERVAL_SECS, "retraining worker started");
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match self.bus.retraining_queue.pop() {
                Some(job) => {
                    let outcome = self.process_job(&job).await;
                    if let JobOutcome::Failed { job_id, reason } = outcome {
                        warn!(job_id = %job_id, %reason, "job did not complete");
                    }
                }
                None => {
                    tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
                }
            }
        }
        info!("retraining worker stopped");
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
        service: "retraining_worker",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Minimal router for the worker's service port.
pub fn build_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
}
