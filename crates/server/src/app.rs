//! Pipeline wiring: one bus, one store, four services.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use driftflow_bus::MessageBus;
use driftflow_core::Config;
use driftflow_monitor::DriftMonitor;
use driftflow_predict::run_model_update_watcher;
use driftflow_retrain::RetrainingWorker;
use driftflow_store::PipelineStore;

/// How often the prediction service polls for `model_update`.
const MODEL_UPDATE_POLL_SECS: u64 = 5;

/// All four services wired over one coordination substrate.
pub struct Pipeline {
    pub config: Config,
    pub bus: Arc<MessageBus>,
    pub store: Arc<dyn PipelineStore>,
    pub ingest_state: Arc<driftflow_ingest::AppState>,
    pub predict_state: Arc<driftflow_predict::AppState>,
    pub stop: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: Config, store: Arc<dyn PipelineStore>) -> Self {
        let bus = Arc::new(MessageBus::new(config.queue.capacity));
        let ingest_state = Arc::new(driftflow_ingest::AppState::new(bus.clone()));
        let predict_state = Arc::new(driftflow_predict::AppState::new(bus.clone(), store.clone()));
        Self {
            config,
            bus,
            store,
            ingest_state,
            predict_state,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn monitor(&self) -> DriftMonitor {
        DriftMonitor::new(self.bus.clone(), self.store.clone(), self.config.drift.clone())
    }

    pub fn worker(&self) -> RetrainingWorker {
        RetrainingWorker::new(
            self.bus.clone(),
            self.store.clone(),
            self.config.model.clone(),
            self.config.drift.window_size,
        )
    }

    /// Spawn the long-lived loops: drift monitor, retraining worker, and
    /// the prediction service's model-update watcher.
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.monitor().run(self.stop.clone())),
            tokio::spawn(self.worker().run(self.stop.clone())),
            tokio::spawn(run_model_update_watcher(
                self.predict_state.clone(),
                Duration::from_secs(MODEL_UPDATE_POLL_SECS),
                self.stop.clone(),
            )),
        ]
    }
}
