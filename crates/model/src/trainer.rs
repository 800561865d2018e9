//! Model training: cross-validation, full refit, and metric collection.

use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use driftflow_core::config::ModelConfig;
use driftflow_core::types::{validate_labels, validate_matrix, FeatureVector, TrainingMetrics};
use driftflow_core::PipelineError;

use crate::metrics::{accuracy, weighted_prf};
use crate::nb::GaussianNb;
use crate::Model;

/// Result of one training run.
pub struct TrainedModel {
    pub model: GaussianNb,
    pub metrics: TrainingMetrics,
    pub model_version: String,
}

/// Trains the bundled classifier with k-fold cross-validation.
pub struct ModelTrainer {
    config: ModelConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Fit on the full labelled set, reporting CV scores alongside the
    /// training-set metrics. Deterministic for a fixed `random_state`.
    pub fn fit(&self, x: &[FeatureVector], y: &[i64]) -> Result<TrainedModel, PipelineError> {
        let (rows, _) = validate_matrix(x)?;
        validate_labels(rows, Some(y))?;

        tracing::info!(samples = rows, "training model");
        let start = Instant::now();

        let (cv_mean, cv_std) = self.cross_validate(x, y)?;

        let model = GaussianNb::fit(x, y, self.config.var_smoothing)?;
        let y_pred = model.predict(x)?;

        let acc = accuracy(y, &y_pred);
        let (precision, recall, f1_score) = weighted_prf(y, &y_pred);
        let training_time = start.elapsed().as_secs_f64();

        let metrics = TrainingMetrics {
            accuracy: acc,
            precision,
            recall,
            f1_score,
            cv_mean,
            cv_std,
            training_time,
            samples_count: rows,
        };

        let model_version = new_model_version();
        tracing::info!(
            version = %model_version,
            accuracy = acc,
            f1 = f1_score,
            cv_mean,
            secs = training_time,
            "training complete"
        );

        Ok(TrainedModel {
            model,
            metrics,
            model_version,
        })
    }

    /// Seeded k-fold CV accuracy. Degenerate sets (fewer samples than two
    /// per fold) skip CV and report zeros.
    fn cross_validate(&self, x: &[FeatureVector], y: &[i64]) -> Result<(f64, f64), PipelineError> {
        let folds = self.config.cv_folds;
        let n = x.len();
        if folds < 2 || n < folds * 2 {
            tracing::debug!(samples = n, folds, "too few samples for cross-validation");
            return Ok((0.0, 0.0));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);

        let mut scores = Vec::with_capacity(folds);
        for fold in 0..folds {
            let held: Vec<usize> = indices
                .iter()
                .copied()
                .skip(fold)
                .step_by(folds)
                .collect();
            let held_set: std::collections::HashSet<usize> = held.iter().copied().collect();

            let mut train_x = Vec::with_capacity(n - held.len());
            let mut train_y = Vec::with_capacity(n - held.len());
            for i in 0..n {
                if !held_set.contains(&i) {
                    train_x.push(x[i].clone());
                    train_y.push(y[i]);
                }
            }

            let fold_model = GaussianNb::fit(&train_x, &train_y, self.config.var_smoothing)?;
            let test_x: Vec<FeatureVector> = held.iter().map(|&i| x[i].clone()).collect();
            let test_y: Vec<i64> = held.iter().map(|&i| y[i]).collect();
            let pred = fold_model.predict(&test_x)?;
            scores.push(accuracy(&test_y, &pred));
        }

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>()
            / scores.len() as f64;
        Ok((mean, var.sqrt()))
    }
}

/// Fresh model version, totally ordered by its embedded timestamp.
pub fn new_model_version() -> String {
    format!("v_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn trainer() -> ModelTrainer {
        ModelTrainer::new(ModelConfig {
            cv_folds: 5,
            random_state: 42,
            var_smoothing: 1e-9,
            models_dir: PathBuf::from("models"),
        })
    }

    fn labelled_clusters(n_per_class: usize) -> (Vec<FeatureVector>, Vec<i64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n_per_class {
            let jitter = (i % 7) as f64 * 0.05;
            x.push(vec![0.0 + jitter, 1.0 - jitter, jitter]);
            y.push(0);
            x.push(vec![6.0 - jitter, -4.0 + jitter, 3.0 + jitter]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn fit_reports_full_metric_set() {
        let (x, y) = labelled_clusters(50);
        let trained = trainer().fit(&x, &y).unwrap();

        assert_eq!(trained.metrics.samples_count, 100);
        assert!(trained.metrics.accuracy > 0.99);
        assert!(trained.metrics.f1_score > 0.99);
        assert!(trained.metrics.cv_mean > 0.99);
        assert!(trained.metrics.cv_std < 0.05);
        assert!(trained.metrics.training_time >= 0.0);
    }

    #[test]
    fn version_format() {
        let (x, y) = labelled_clusters(10);
        let trained = trainer().fit(&x, &y).unwrap();
        assert!(trained.model_version.starts_with("v_"));
        // v_YYYYMMDD_HHMMSS
        assert_eq!(trained.model_version.len(), 17);
    }

    #[test]
    fn tiny_sets_skip_cross_validation() {
        let x = vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]];
        let y = vec![0, 0, 1, 1];
        let trained = trainer().fit(&x, &y).unwrap();
        assert_eq!(trained.metrics.cv_mean, 0.0);
        assert_eq!(trained.metrics.cv_std, 0.0);
        assert!(trained.metrics.accuracy > 0.99);
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (x, y) = labelled_clusters(30);
        let a = trainer().fit(&x, &y).unwrap();
        let b = trainer().fit(&x, &y).unwrap();
        assert_eq!(a.metrics.cv_mean, b.metrics.cv_mean);
        assert_eq!(a.metrics.accuracy, b.metrics.accuracy);
    }

    #[test]
    fn rejects_ragged_input() {
        let x = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(trainer().fit(&x, &[0, 1]).is_err());
    }
}
