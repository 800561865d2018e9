//! Gaussian naive-Bayes classifier.
//!
//! The bundled Trainer collaborator. Deterministic, serializable, and
//! exact on save/load round-trips, which is all the serving path relies on.

use serde::{Deserialize, Serialize};

use driftflow_core::types::{validate_matrix, FeatureVector};
use driftflow_core::PipelineError;

use crate::Model;

const LN_2PI: f64 = 1.837877066409345;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNb {
    classes: Vec<i64>,
    /// Log class priors, aligned with `classes`.
    log_priors: Vec<f64>,
    /// Per-class feature means, `[class][feature]`.
    means: Vec<Vec<f64>>,
    /// Per-class feature variances (smoothed), `[class][feature]`.
    variances: Vec<Vec<f64>>,
    n_features: usize,
}

impl GaussianNb {
    /// Fit on a labelled matrix. `var_smoothing` scales the variance floor
    /// relative to the largest per-feature variance.
    pub fn fit(
        x: &[FeatureVector],
        y: &[i64],
        var_smoothing: f64,
    ) -> Result<Self, PipelineError> {
        let (rows, cols) = validate_matrix(x)?;
        if y.len() != rows {
            return Err(PipelineError::InvalidShape(format!(
                "{} labels for {} rows",
                y.len(),
                rows
            )));
        }

        let mut classes: Vec<i64> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        // Variance floor: var_smoothing × the largest overall feature variance.
        let mut epsilon = 0.0f64;
        for j in 0..cols {
            let col: Vec<f64> = x.iter().map(|r| r[j]).collect();
            let m = col.iter().sum::<f64>() / rows as f64;
            let v = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / rows as f64;
            if v > epsilon {
                epsilon = v;
            }
        }
        let epsilon = if epsilon > 0.0 {
            var_smoothing * epsilon
        } else {
            var_smoothing
        };

        let mut log_priors = Vec::with_capacity(classes.len());
        let mut means = Vec::with_capacity(classes.len());
        let mut variances = Vec::with_capacity(classes.len());

        for &class in &classes {
            let members: Vec<&FeatureVector> = x
                .iter()
                .zip(y)
                .filter(|(_, &label)| label == class)
                .map(|(row, _)| row)
                .collect();
            let count = members.len() as f64;
            log_priors.push((count / rows as f64).ln());

            let mut mu = vec![0.0f64; cols];
            for row in &members {
                for (j, &v) in row.iter().enumerate() {
                    mu[j] += v;
                }
            }
            for m in &mut mu {
                *m /= count;
            }

            let mut var = vec![0.0f64; cols];
            for row in &members {
                for (j, &v) in row.iter().enumerate() {
                    let d = v - mu[j];
                    var[j] += d * d;
                }
            }
            for v in &mut var {
                *v = *v / count + epsilon;
            }

            means.push(mu);
            variances.push(var);
        }

        Ok(Self {
            classes,
            log_priors,
            means,
            variances,
            n_features: cols,
        })
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn check_dims(&self, x: &[FeatureVector]) -> Result<(), PipelineError> {
        let (_, cols) = validate_matrix(x)?;
        if cols != self.n_features {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features,
                got: cols,
            });
        }
        Ok(())
    }

    /// Joint log-likelihood of one row under each class.
    fn log_likelihood(&self, row: &[f64]) -> Vec<f64> {
        self.classes
            .iter()
            .enumerate()
            .map(|(c, _)| {
                let mut ll = self.log_priors[c];
                for (j, &v) in row.iter().enumerate() {
                    let var = self.variances[c][j];
                    let d = v - self.means[c][j];
                    ll += -0.5 * (LN_2PI + var.ln()) - d * d / (2.0 * var);
                }
                ll
            })
            .collect()
    }
}

impl Model for GaussianNb {
    fn predict(&self, x: &[FeatureVector]) -> Result<Vec<i64>, PipelineError> {
        self.check_dims(x)?;
        Ok(x.iter()
            .map(|row| {
                let ll = self.log_likelihood(row);
                let best = ll
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.classes[best]
            })
            .collect())
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> Result<Vec<Vec<f64>>, PipelineError> {
        self.check_dims(x)?;
        Ok(x.iter()
            .map(|row| {
                let ll = self.log_likelihood(row);
                // Log-sum-exp normalization.
                let max = ll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = ll.iter().map(|l| (l - max).exp()).collect();
                let total: f64 = exps.iter().sum();
                exps.into_iter().map(|e| e / total).collect()
            })
            .collect())
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.classes.len()
    }
}
