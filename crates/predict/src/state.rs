//! Prediction service state: the shared-read active-model handle.

use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::sync::RwLock;

use driftflow_bus::MessageBus;
use driftflow_core::PipelineError;
use driftflow_model::{load_artifact, GaussianNb};
use driftflow_store::PipelineStore;

/// Immutable snapshot of the deployed model. Handlers clone the `Arc` out
/// of the lock and run the whole request against one snapshot, so a
/// concurrent promotion never changes the version mid-call.
pub struct ActiveModel {
    pub version: String,
    pub model: GaussianNb,
}

pub struct AppState {
    pub bus: Arc<MessageBus>,
    pub store: Arc<dyn PipelineStore>,
    active: RwLock<Option<Arc<ActiveModel>>>,
    pub total_predictions: AtomicU64,
}

impl AppState {
    pub fn new(bus: Arc<MessageBus>, store: Arc<dyn PipelineStore>) -> Self {
        Self {
            bus,
            store,
            active: RwLock::new(None),
            total_predictions: AtomicU64::new(0),
        }
    }

    /// Currently loaded model, if any.
    pub async fn loaded_model(&self) -> Option<Arc<ActiveModel>> {
        self.active.read().await.clone()
    }

    /// The model handle for a request: the cached snapshot, or one lazy
    /// load from the registry.
    pub async fn model_handle(&self) -> Result<Arc<ActiveModel>, PipelineError> {
        if let Some(handle) = self.loaded_model().await {
            return Ok(handle);
        }
        self.reload_model().await?.ok_or(PipelineError::NoModel)
    }

    /// Re-read the registry's deployed row and swap the in-memory handle.
    ///
    /// A registry row whose artifact fails to load is ignored (logged) and
    /// the previously loaded model keeps serving. Idempotent.
    pub async fn reload_model(&self) -> Result<Option<Arc<ActiveModel>>, PipelineError> {
        let entry = self
            .store
            .get_active_model()
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        let Some(entry) = entry else {
            tracing::warn!("no deployed model in registry");
            return Ok(self.loaded_model().await);
        };

        match load_artifact(Path::new(&entry.model_path)) {
            Ok(artifact) => {
                let handle = Arc::new(ActiveModel {
                    version: entry.model_version.clone(),
                    model: artifact.model,
                });
                let mut guard = self.active.write().await;
                *guard = Some(handle.clone());
                drop(guard);
                tracing::info!(version = %entry.model_version, "model loaded");
                Ok(Some(handle))
            }
            Err(e) => {
                tracing::warn!(
                    version = %entry.model_version,
                    path = %entry.model_path,
                    error = %e,
                    "artifact load failed — keeping previous model"
                );
                Ok(self.loaded_model().await)
            }
        }
    }
}
