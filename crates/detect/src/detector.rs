//! Per-feature drift tests with overall aggregation.

use serde::{Deserialize, Serialize};

use driftflow_core::types::{validate_matrix, FeatureVector};
use driftflow_core::PipelineError;

use crate::stats::{ks_2samp, mean, psi, std_dev};

/// PSI value above which a feature counts as drifted.
const PSI_THRESHOLD: f64 = 0.2;
/// Normalized mean shift above which a feature counts as drifted.
const MEAN_SHIFT_THRESHOLD: f64 = 2.0;
/// Fraction of drifted features that must be exceeded for overall drift.
const DRIFT_FRACTION: f64 = 0.2;
/// Number of reference-percentile bins for PSI.
const PSI_BINS: usize = 10;

/// Drift metrics for a single feature column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub name: String,
    pub ks_statistic: f64,
    pub ks_pvalue: f64,
    pub psi: f64,
    pub mean_shift: f64,
    pub drift_detected: bool,
}

/// Aggregate counts over all feature columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total_features: usize,
    pub features_with_drift: usize,
    pub drift_percentage: f64,
}

/// Outcome of one drift check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub overall_drift: bool,
    pub features: Vec<FeatureDrift>,
    pub summary: DriftSummary,
}

impl DriftReport {
    /// Aggregate drift score in [0, 1]: drifted features / total features.
    pub fn drift_score(&self) -> f64 {
        self.summary.drift_percentage / 100.0
    }

    /// Names of the drifted features, in column order.
    pub fn affected_features(&self) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| f.drift_detected)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Nested per-feature metrics map for the drift_events JSON column.
    pub fn to_metrics_json(&self) -> serde_json::Value {
        let mut features = serde_json::Map::new();
        for f in &self.features {
            features.insert(
                f.name.clone(),
                serde_json::json!({
                    "ks_statistic": f.ks_statistic,
                    "ks_pvalue": f.ks_pvalue,
                    "psi": f.psi,
                    "mean_shift": f.mean_shift,
                    "drift_detected": f.drift_detected,
                }),
            );
        }
        serde_json::json!({
            "overall_drift": self.overall_drift,
            "features": features,
            "summary": self.summary,
        })
    }
}

/// Detects distribution shift of served traffic against a reference matrix.
pub struct DriftDetector {
    threshold: f64,
    feature_names: Vec<String>,
    // Column-major copy of the reference matrix.
    columns: Vec<Vec<f64>>,
}

impl DriftDetector {
    /// Build a detector over a reference matrix (rows × features).
    pub fn new(threshold: f64, reference: &[FeatureVector]) -> Result<Self, PipelineError> {
        let (_, cols) = validate_matrix(reference)?;
        let names = (0..cols).map(|i| format!("feature_{i}")).collect();
        Ok(Self::with_feature_names(threshold, reference, names))
    }

    fn with_feature_names(
        threshold: f64,
        reference: &[FeatureVector],
        feature_names: Vec<String>,
    ) -> Self {
        let cols = feature_names.len();
        let mut columns = vec![Vec::with_capacity(reference.len()); cols];
        for row in reference {
            for (i, &v) in row.iter().enumerate() {
                columns[i].push(v);
            }
        }
        Self {
            threshold,
            feature_names,
            columns,
        }
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn reference_len(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Run all per-feature tests against `current` and aggregate.
    pub fn detect(&self, current: &[FeatureVector]) -> Result<DriftReport, PipelineError> {
        let (_, cols) = validate_matrix(current)?;
        if cols != self.n_features() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features(),
                got: cols,
            });
        }

        let mut features = Vec::with_capacity(cols);
        let mut drift_count = 0usize;

        for (i, name) in self.feature_names.iter().enumerate() {
            let reference = &self.columns[i];
            let column: Vec<f64> = current.iter().map(|row| row[i]).collect();

            let (ks_statistic, ks_pvalue) = ks_2samp(reference, &column);
            let psi_value = psi(reference, &column, PSI_BINS);
            let mean_shift =
                (mean(&column) - mean(reference)).abs() / (std_dev(reference) + 1e-10);

            let drift_detected = ks_pvalue < self.threshold
                || psi_value > PSI_THRESHOLD
                || mean_shift > MEAN_SHIFT_THRESHOLD;
            if drift_detected {
                drift_count += 1;
            }

            features.push(FeatureDrift {
                name: name.clone(),
                ks_statistic,
                ks_pvalue,
                psi: psi_value,
                mean_shift,
                drift_detected,
            });
        }

        let total = self.feature_names.len();
        let overall_drift = drift_count as f64 > total as f64 * DRIFT_FRACTION;

        Ok(DriftReport {
            overall_drift,
            features,
            summary: DriftSummary {
                total_features: total,
                features_with_drift: drift_count,
                drift_percentage: drift_count as f64 / total as f64 * 100.0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Seeded N(mu, sigma) matrix via the Box-Muller transform.
    fn gaussian_matrix(rng: &mut StdRng, rows: usize, cols: usize, mu: f64, sigma: f64) -> Vec<FeatureVector> {
        (0..rows)
            .map(|_| {
                (0..cols)
                    .map(|_| {
                        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                        let u2: f64 = rng.gen_range(0.0..1.0);
                        mu + sigma
                            * (-2.0 * u1.ln()).sqrt()
                            * (2.0 * std::f64::consts::PI * u2).cos()
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let reference = vec![vec![0.0, 1.0], vec![1.0, 2.0]];
        let detector = DriftDetector::new(0.05, &reference).unwrap();
        let err = detector.detect(&[vec![1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { expected: 2, got: 3 }));
    }

    #[test]
    fn same_distribution_no_drift() {
        let mut rng = StdRng::seed_from_u64(7);
        let reference = gaussian_matrix(&mut rng, 1000, 8, 0.0, 1.0);
        let current = gaussian_matrix(&mut rng, 500, 8, 0.0, 1.0);

        // Tight threshold keeps the expected KS false-positive count ~0.08
        // across 8 features, so the assertion is stable under reseeding.
        let detector = DriftDetector::new(0.01, &reference).unwrap();
        let report = detector.detect(&current).unwrap();

        assert!(!report.overall_drift, "summary: {:?}", report.summary);
        assert!(report.drift_score() <= 0.2);
    }

    #[test]
    fn shifted_distribution_drifts() {
        let mut rng = StdRng::seed_from_u64(7);
        let reference = gaussian_matrix(&mut rng, 1000, 8, 0.0, 1.0);
        let current = gaussian_matrix(&mut rng, 500, 8, 2.5, 1.0);

        let detector = DriftDetector::new(0.05, &reference).unwrap();
        let report = detector.detect(&current).unwrap();

        assert!(report.overall_drift);
        assert!(report.drift_score() > 0.2);
        // A 2.5-sigma shift should flag essentially every feature.
        assert!(report.summary.features_with_drift >= 7);
        assert_eq!(report.affected_features().len(), report.summary.features_with_drift);
    }

    #[test]
    fn aggregation_threshold_is_strict() {
        // 5 features, exactly one drifted: 0.2 is not > 0.2.
        let mut rng = StdRng::seed_from_u64(11);
        let reference = gaussian_matrix(&mut rng, 800, 5, 0.0, 1.0);
        let mut current = gaussian_matrix(&mut rng, 400, 5, 0.0, 1.0);
        for row in &mut current {
            row[0] += 10.0;
        }

        let detector = DriftDetector::new(0.01, &reference).unwrap();
        let report = detector.detect(&current).unwrap();

        if report.summary.features_with_drift == 1 {
            assert!(!report.overall_drift);
            assert!((report.drift_score() - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_reference_column_stays_finite() {
        let reference: Vec<FeatureVector> =
            (0..200).map(|i| vec![5.0, i as f64]).collect();
        let current: Vec<FeatureVector> =
            (0..200).map(|i| vec![5.0, i as f64]).collect();

        let detector = DriftDetector::new(0.05, &reference).unwrap();
        let report = detector.detect(&current).unwrap();

        let constant = &report.features[0];
        assert_eq!(constant.psi, 0.0);
        assert!(constant.mean_shift.is_finite());
        assert_eq!(constant.mean_shift, 0.0);
    }

    #[test]
    fn metrics_json_has_per_feature_map() {
        let reference = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let detector = DriftDetector::new(0.05, &reference).unwrap();
        let report = detector.detect(&reference).unwrap();

        let json = report.to_metrics_json();
        assert!(json["features"]["feature_0"]["ks_pvalue"].is_number());
        assert_eq!(json["summary"]["total_features"], 1);
    }
}
