//! SQLite adapter: JSON payloads live in TEXT columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use driftflow_core::types::{
    DriftEventRecord, FeatureStoreRow, ModelRegistryEntry, PredictionRecord, TrainingJobRecord,
    TrainingMetrics,
};

use crate::error::{map_unique_violation, StoreError};
use crate::PipelineStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    features TEXT NOT NULL,
    prediction INTEGER NOT NULL,
    probability REAL,
    true_label INTEGER,
    model_version TEXT,
    service_id TEXT
);
CREATE TABLE IF NOT EXISTS drift_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    drift_detected BOOLEAN NOT NULL,
    drift_score REAL,
    affected_features TEXT,
    drift_metrics TEXT,
    action_taken TEXT
);
CREATE TABLE IF NOT EXISTS training_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    job_id TEXT UNIQUE,
    status TEXT,
    accuracy REAL,
    f1_score REAL,
    precision_score REAL,
    recall_score REAL,
    cv_mean REAL,
    cv_std REAL,
    training_time REAL,
    samples_count INTEGER,
    model_version TEXT,
    trigger_reason TEXT,
    tracking_run_id TEXT
);
CREATE TABLE IF NOT EXISTS model_registry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    model_version TEXT UNIQUE,
    model_path TEXT,
    metrics TEXT,
    status TEXT,
    deployed BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS feature_store (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    feature_name TEXT,
    feature_value REAL,
    entity_id TEXT,
    feature_group TEXT
);
";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating tables as needed). SQLite serializes writers, so the
    /// pool is held to a single connection; this also keeps `:memory:`
    /// databases coherent.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!(url, "sqlite store initialized");
        Ok(store)
    }

    /// Fresh in-memory database (used by tests and local runs).
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn prediction_from_row(row: &SqliteRow) -> Result<PredictionRecord, StoreError> {
    let features: String = row.try_get("features")?;
    Ok(PredictionRecord {
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        features: serde_json::from_str(&features)?,
        prediction: row.try_get("prediction")?,
        probability: row.try_get::<Option<f64>, _>("probability")?.unwrap_or(0.0),
        true_label: row.try_get("true_label")?,
        model_version: row
            .try_get::<Option<String>, _>("model_version")?
            .unwrap_or_default(),
        service_id: row
            .try_get::<Option<String>, _>("service_id")?
            .unwrap_or_default(),
    })
}

fn drift_event_from_row(row: &SqliteRow) -> Result<DriftEventRecord, StoreError> {
    let affected: String = row.try_get("affected_features")?;
    let metrics: String = row.try_get("drift_metrics")?;
    let action: String = row.try_get("action_taken")?;
    Ok(DriftEventRecord {
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        drift_detected: row.try_get("drift_detected")?,
        drift_score: row.try_get::<Option<f64>, _>("drift_score")?.unwrap_or(0.0),
        affected_features: serde_json::from_str(&affected)?,
        drift_metrics: serde_json::from_str(&metrics)?,
        action_taken: action
            .parse()
            .map_err(|_| StoreError::Serde(serde::de::Error::custom("bad action_taken")))?,
    })
}

fn registry_entry_from_row(row: &SqliteRow) -> Result<ModelRegistryEntry, StoreError> {
    let metrics: String = row.try_get("metrics")?;
    let status: String = row.try_get("status")?;
    Ok(ModelRegistryEntry {
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        model_version: row.try_get("model_version")?,
        model_path: row.try_get("model_path")?,
        metrics: serde_json::from_str(&metrics)?,
        status: status
            .parse()
            .map_err(|_| StoreError::Serde(serde::de::Error::custom("bad model status")))?,
        deployed: row.try_get("deployed")?,
    })
}

fn training_job_from_row(row: &SqliteRow) -> Result<TrainingJobRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let accuracy: Option<f64> = row.try_get("accuracy")?;
    let metrics = accuracy.map(|accuracy| {
        Ok::<_, sqlx::Error>(TrainingMetrics {
            accuracy,
            precision: row.try_get::<Option<f64>, _>("precision_score")?.unwrap_or(0.0),
            recall: row.try_get::<Option<f64>, _>("recall_score")?.unwrap_or(0.0),
            f1_score: row.try_get::<Option<f64>, _>("f1_score")?.unwrap_or(0.0),
            cv_mean: row.try_get::<Option<f64>, _>("cv_mean")?.unwrap_or(0.0),
            cv_std: row.try_get::<Option<f64>, _>("cv_std")?.unwrap_or(0.0),
            training_time: row.try_get::<Option<f64>, _>("training_time")?.unwrap_or(0.0),
            samples_count: row.try_get::<Option<i64>, _>("samples_count")?.unwrap_or(0) as usize,
        })
    });
    Ok(TrainingJobRecord {
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        job_id: row.try_get("job_id")?,
        status: status
            .parse()
            .map_err(|_| StoreError::Serde(serde::de::Error::custom("bad job status")))?,
        metrics: metrics.transpose()?,
        model_version: row.try_get("model_version")?,
        trigger_reason: row
            .try_get::<Option<String>, _>("trigger_reason")?
            .and_then(|s| s.parse().ok()),
        tracking_run_id: row.try_get("tracking_run_id")?,
    })
}

#[async_trait]
impl PipelineStore for SqliteStore {
    async fn log_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO predictions
             (timestamp, features, prediction, probability, true_label, model_version, service_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.timestamp)
        .bind(serde_json::to_string(&record.features)?)
        .bind(record.prediction)
        .bind(record.probability)
        .bind(record.true_label)
        .bind(&record.model_version)
        .bind(&record.service_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_drift_event(&self, event: &DriftEventRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO drift_events
             (timestamp, drift_detected, drift_score, affected_features, drift_metrics, action_taken)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.timestamp)
        .bind(event.drift_detected)
        .bind(event.drift_score)
        .bind(serde_json::to_string(&event.affected_features)?)
        .bind(serde_json::to_string(&event.drift_metrics)?)
        .bind(event.action_taken.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_training_job(&self, job: &TrainingJobRecord) -> Result<(), StoreError> {
        let m = job.metrics.as_ref();
        sqlx::query(
            "INSERT INTO training_jobs
             (timestamp, job_id, status, accuracy, f1_score, precision_score, recall_score,
              cv_mean, cv_std, training_time, samples_count, model_version, trigger_reason,
              tracking_run_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT(job_id) DO UPDATE SET
                timestamp = excluded.timestamp,
                status = excluded.status,
                accuracy = excluded.accuracy,
                f1_score = excluded.f1_score,
                precision_score = excluded.precision_score,
                recall_score = excluded.recall_score,
                cv_mean = excluded.cv_mean,
                cv_std = excluded.cv_std,
                training_time = excluded.training_time,
                samples_count = excluded.samples_count,
                model_version = COALESCE(excluded.model_version, training_jobs.model_version),
                trigger_reason = COALESCE(excluded.trigger_reason, training_jobs.trigger_reason),
                tracking_run_id = COALESCE(excluded.tracking_run_id, training_jobs.tracking_run_id)",
        )
        .bind(job.timestamp)
        .bind(&job.job_id)
        .bind(job.status.to_string())
        .bind(m.map(|m| m.accuracy))
        .bind(m.map(|m| m.f1_score))
        .bind(m.map(|m| m.precision))
        .bind(m.map(|m| m.recall))
        .bind(m.map(|m| m.cv_mean))
        .bind(m.map(|m| m.cv_std))
        .bind(m.map(|m| m.training_time))
        .bind(m.map(|m| m.samples_count as i64))
        .bind(&job.model_version)
        .bind(job.trigger_reason.map(|t| t.to_string()))
        .bind(&job.tracking_run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn register_model(&self, entry: &ModelRegistryEntry) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO model_registry
             (timestamp, model_version, model_path, metrics, status, deployed)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.timestamp)
        .bind(&entry.model_version)
        .bind(&entry.model_path)
        .bind(serde_json::to_string(&entry.metrics)?)
        .bind(entry.status.to_string())
        .bind(entry.deployed)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(map_unique_violation(e, &entry.model_version)),
        }
    }

    async fn deploy_model(&self, model_version: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let promoted = sqlx::query(
            "UPDATE model_registry SET deployed = TRUE, status = 'active'
             WHERE model_version = $1",
        )
        .bind(model_version)
        .execute(&mut *tx)
        .await?;

        if promoted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::ModelNotFound(model_version.to_string()));
        }

        sqlx::query(
            "UPDATE model_registry SET deployed = FALSE, status = 'trained'
             WHERE deployed = TRUE AND model_version <> $1",
        )
        .bind(model_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(model_version, "model deployed");
        Ok(())
    }

    async fn get_active_model(&self) -> Result<Option<ModelRegistryEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT timestamp, model_version, model_path, metrics, status, deployed
             FROM model_registry
             WHERE deployed = TRUE
             ORDER BY id DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(registry_entry_from_row).transpose()
    }

    async fn get_recent_predictions(
        &self,
        limit: i64,
    ) -> Result<Vec<PredictionRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT timestamp, features, prediction, probability, true_label,
                    model_version, service_id
             FROM predictions
             ORDER BY id DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    async fn get_recent_drift_events(
        &self,
        limit: i64,
    ) -> Result<Vec<DriftEventRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT timestamp, drift_detected, drift_score, affected_features,
                    drift_metrics, action_taken
             FROM drift_events
             ORDER BY id DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(drift_event_from_row).collect()
    }

    async fn get_training_job(
        &self,
        job_id: &str,
    ) -> Result<Option<TrainingJobRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT timestamp, job_id, status, accuracy, f1_score, precision_score,
                    recall_score, cv_mean, cv_std, training_time, samples_count,
                    model_version, trigger_reason, tracking_run_id
             FROM training_jobs
             WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(training_job_from_row).transpose()
    }

    async fn log_features(&self, rows: &[FeatureStoreRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO feature_store
                 (timestamp, feature_name, feature_value, entity_id, feature_group)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.timestamp)
            .bind(&row.feature_name)
            .bind(row.feature_value)
            .bind(&row.entity_id)
            .bind(&row.feature_group)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn model_count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_registry")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn deployed_model_count(&self) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM model_registry WHERE deployed = TRUE")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
