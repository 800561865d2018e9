//! Durable audit log and model registry behind a single trait.
//!
//! Two adapters: [`PostgresStore`] (JSONB columns) and [`SqliteStore`]
//! (TEXT-serialized JSON). Model promotion is transactional in both, so at
//! most one registry row carries `deployed = true` at any instant.

pub mod error;
pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;

use driftflow_core::types::{
    DriftEventRecord, FeatureStoreRow, ModelRegistryEntry, PredictionRecord, TrainingJobRecord,
};

pub use error::StoreError;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// The persistence operations the pipeline core depends on.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Append one served prediction (append-only).
    async fn log_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError>;

    /// Append one drift check outcome.
    async fn log_drift_event(&self, event: &DriftEventRecord) -> Result<(), StoreError>;

    /// Insert or update a training job row keyed by `job_id`.
    async fn log_training_job(&self, job: &TrainingJobRecord) -> Result<(), StoreError>;

    /// Append a registry row (`status = trained`, not deployed).
    async fn register_model(&self, entry: &ModelRegistryEntry) -> Result<(), StoreError>;

    /// Atomically demote the current deployment and deploy `model_version`.
    /// Idempotent; fails with [`StoreError::ModelNotFound`] on an unknown version.
    async fn deploy_model(&self, model_version: &str) -> Result<(), StoreError>;

    /// The registry row with `deployed = true`, if any.
    async fn get_active_model(&self) -> Result<Option<ModelRegistryEntry>, StoreError>;

    /// Most recent predictions, newest first.
    async fn get_recent_predictions(&self, limit: i64) -> Result<Vec<PredictionRecord>, StoreError>;

    /// Most recent drift events, newest first.
    async fn get_recent_drift_events(&self, limit: i64)
        -> Result<Vec<DriftEventRecord>, StoreError>;

    /// Look up one training job by id.
    async fn get_training_job(&self, job_id: &str)
        -> Result<Option<TrainingJobRecord>, StoreError>;

    /// Append scalar feature observations.
    async fn log_features(&self, rows: &[FeatureStoreRow]) -> Result<(), StoreError>;

    /// Total registered models.
    async fn model_count(&self) -> Result<i64, StoreError>;

    /// Registry rows currently flagged deployed (invariant: ≤ 1).
    async fn deployed_model_count(&self) -> Result<i64, StoreError>;
}
