//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("model version not found: {0}")]
    ModelNotFound(String),

    #[error("duplicate model version: {0}")]
    DuplicateModel(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Map a unique-constraint violation on `model_version` to a friendly error.
pub(crate) fn map_unique_violation(e: sqlx::Error, version: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::DuplicateModel(version.to_string());
        }
    }
    tracing::error!("store database error: {}", e);
    StoreError::Database(e)
}
