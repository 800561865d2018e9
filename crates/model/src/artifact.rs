//! Model artifact persistence.
//!
//! Artifacts are opaque to everything but this module: JSON bundles of the
//! fitted classifier plus its version, written under the models directory
//! as `model_<version>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use driftflow_core::PipelineError;

use crate::nb::GaussianNb;

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: GaussianNb,
    pub model_version: String,
    pub saved_at: DateTime<Utc>,
}

/// Deterministic artifact path for a version.
pub fn artifact_path(models_dir: &Path, version: &str) -> PathBuf {
    models_dir.join(format!("model_{version}.json"))
}

/// Write an artifact, creating parent directories as needed.
pub fn save_artifact(path: &Path, model: &GaussianNb, version: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let artifact = ModelArtifact {
        model: model.clone(),
        model_version: version.to_string(),
        saved_at: Utc::now(),
    };
    let json = serde_json::to_vec_pretty(&artifact)?;
    fs::write(path, json)?;
    tracing::info!(path = %path.display(), version, "model artifact saved");
    Ok(())
}

/// Read an artifact back from disk.
pub fn load_artifact(path: &Path) -> Result<ModelArtifact, PipelineError> {
    let bytes = fs::read(path)
        .map_err(|e| PipelineError::Artifact(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PipelineError::Artifact(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Model;

    #[test]
    fn artifact_path_naming() {
        let p = artifact_path(Path::new("models"), "v_20250101_120000");
        assert_eq!(p, PathBuf::from("models/model_v_20250101_120000.json"));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let x = vec![vec![0.0, 0.0], vec![0.2, 0.1], vec![5.0, 5.0], vec![5.1, 4.9]];
        let y = vec![0, 0, 1, 1];
        let model = GaussianNb::fit(&x, &y, 1e-9).unwrap();

        let path = artifact_path(dir.path(), "v_test");
        save_artifact(&path, &model, "v_test").unwrap();

        let loaded = load_artifact(&path).unwrap();
        assert_eq!(loaded.model_version, "v_test");
        let input = vec![vec![0.1, 0.1], vec![4.9, 5.2]];
        assert_eq!(model.predict(&input).unwrap(), loaded.model.predict(&input).unwrap());
        assert_eq!(
            model.predict_proba(&input).unwrap(),
            loaded.model.predict_proba(&input).unwrap()
        );
    }

    #[test]
    fn load_missing_artifact_errors() {
        let err = load_artifact(Path::new("/nonexistent/model_v_x.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact(_)));
    }

    #[test]
    fn load_corrupt_artifact_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_v_bad.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(load_artifact(&path), Err(PipelineError::Artifact(_))));
    }
}
