//! The typed message bus binding the four pipeline queues and the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use driftflow_core::types::{Batch, FeatureVector, RetrainJob, ServedRecord, StreamSample};

use crate::cache::ValueCache;
use crate::fifo::Fifo;

/// Cache key holding the reference feature matrix for drift checks.
pub const REFERENCE_DATA_KEY: &str = "reference_data";
/// Cache key the retraining worker publishes after a promotion.
pub const MODEL_UPDATE_KEY: &str = "model_update";

/// Notification that a new model version was promoted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUpdate {
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// In-process coordination substrate shared by all four services.
///
/// Ownership: ingestion produces onto `data_queue`/`stream_queue`,
/// prediction produces onto `prediction_buffer`, the drift monitor and
/// retraining worker are the single consumers of `prediction_buffer` and
/// `data_queue`/`retraining_queue` respectively.
pub struct MessageBus {
    pub data_queue: Fifo<Batch>,
    pub stream_queue: Fifo<StreamSample>,
    pub prediction_buffer: Fifo<ServedRecord>,
    pub retraining_queue: Fifo<RetrainJob>,
    cache: ValueCache,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            data_queue: Fifo::new("data_queue", capacity),
            stream_queue: Fifo::new("stream_queue", capacity),
            prediction_buffer: Fifo::new("prediction_buffer", capacity),
            retraining_queue: Fifo::new("retraining_queue", capacity),
            cache: ValueCache::new(),
        }
    }

    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    // ── Well-known cache keys ─────────────────────────────────────

    pub fn set_reference_data(&self, matrix: &[FeatureVector]) {
        self.cache.set(REFERENCE_DATA_KEY, &matrix);
    }

    pub fn reference_data(&self) -> Option<Vec<FeatureVector>> {
        self.cache.get(REFERENCE_DATA_KEY)
    }

    pub fn publish_model_update(&self, version: &str) {
        self.cache.set(
            MODEL_UPDATE_KEY,
            &ModelUpdate {
                version: version.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    pub fn model_update(&self) -> Option<ModelUpdate> {
        self.cache.get(MODEL_UPDATE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_are_independent() {
        let bus = MessageBus::new(8);
        bus.data_queue
            .push(Batch {
                features: vec![vec![1.0, 2.0]],
                labels: Some(vec![0]),
                batch_id: Some("b1".to_string()),
                timestamp: Utc::now(),
            })
            .unwrap();
        assert_eq!(bus.data_queue.len(), 1);
        assert_eq!(bus.stream_queue.len(), 0);
        assert_eq!(bus.prediction_buffer.len(), 0);
        assert_eq!(bus.retraining_queue.len(), 0);
    }

    #[test]
    fn reference_data_roundtrip() {
        let bus = MessageBus::new(8);
        assert!(bus.reference_data().is_none());
        let matrix = vec![vec![0.0, 1.0], vec![2.0, 3.0]];
        bus.set_reference_data(&matrix);
        assert_eq!(bus.reference_data().unwrap(), matrix);
    }

    #[test]
    fn model_update_publish() {
        let bus = MessageBus::new(8);
        assert!(bus.model_update().is_none());
        bus.publish_model_update("v_20250101_120000");
        let update = bus.model_update().unwrap();
        assert_eq!(update.version, "v_20250101_120000");
    }
}
