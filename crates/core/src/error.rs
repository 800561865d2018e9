use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("dimension mismatch: model expects {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("no model available")]
    NoModel,

    #[error("queue '{0}' is full")]
    QueueFull(&'static str),

    #[error("store error: {0}")]
    Store(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}
