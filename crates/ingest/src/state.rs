use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use driftflow_bus::MessageBus;

pub struct AppState {
    pub bus: Arc<MessageBus>,
    /// Feature dimension, fixed by the first ingested record (0 = unset).
    pub expected_dim: AtomicUsize,
}

impl AppState {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            expected_dim: AtomicUsize::new(0),
        }
    }
}
