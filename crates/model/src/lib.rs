pub mod artifact;
pub mod metrics;
pub mod nb;
pub mod tracking;
pub mod trainer;

use driftflow_core::types::FeatureVector;
use driftflow_core::PipelineError;

/// Fitted classifier contract the serving path depends on.
pub trait Model: Send + Sync {
    /// Predicted class per row.
    fn predict(&self, x: &[FeatureVector]) -> Result<Vec<i64>, PipelineError>;

    /// Class-probability row per input row; rows sum to 1.
    fn predict_proba(&self, x: &[FeatureVector]) -> Result<Vec<Vec<f64>>, PipelineError>;

    fn n_features(&self) -> usize;

    fn n_classes(&self) -> usize;
}

pub use artifact::{artifact_path, load_artifact, save_artifact, ModelArtifact};
pub use nb::GaussianNb;
pub use tracking::{LogSink, RunStatus, TrackingSink};
pub use trainer::{new_model_version, ModelTrainer, TrainedModel};
