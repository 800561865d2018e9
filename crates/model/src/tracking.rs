//! Experiment-tracking sink.
//!
//! The pipeline only needs run bracketing and parameter/metric logging;
//! a real tracking backend plugs in behind [`TrackingSink`].

use driftflow_core::types::TrainingMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

pub trait TrackingSink: Send + Sync {
    /// Open a run and return its id.
    fn start_run(&self, name: &str) -> String;

    fn log_params(&self, run_id: &str, params: &serde_json::Value);

    fn log_metrics(&self, run_id: &str, metrics: &TrainingMetrics);

    fn end_run(&self, run_id: &str, status: RunStatus);
}

/// Sink that records runs to the process log.
pub struct LogSink {
    experiment: String,
}

impl LogSink {
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
        }
    }
}

impl TrackingSink for LogSink {
    fn start_run(&self, name: &str) -> String {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(experiment = %self.experiment, run = name, run_id = %run_id, "tracking run started");
        run_id
    }

    fn log_params(&self, run_id: &str, params: &serde_json::Value) {
        tracing::info!(run_id, %params, "tracking params");
    }

    fn log_metrics(&self, run_id: &str, metrics: &TrainingMetrics) {
        tracing::info!(
            run_id,
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            cv_mean = metrics.cv_mean,
            "tracking metrics"
        );
    }

    fn end_run(&self, run_id: &str, status: RunStatus) {
        tracing::info!(run_id, ?status, "tracking run ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sink_returns_unique_run_ids() {
        let sink = LogSink::new("exp");
        let a = sink.start_run("run-a");
        let b = sink.start_run("run-b");
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
