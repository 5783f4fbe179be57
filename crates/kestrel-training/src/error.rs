use kestrel_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid hyperparameters: {0}")]
    InvalidSpec(String),

    #[error("unsupported export format: {0} (expected one of onnx, torchscript, openvino, coreml, tflite, saved_model, pb, trt)")]
    UnsupportedFormat(String),

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("{0}")]
    RuntimeFailure(String),

    #[error("missing dependency: {0}")]
    DependencyMissing(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
