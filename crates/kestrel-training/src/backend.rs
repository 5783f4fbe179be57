//! Seam to the object-detection library that does the actual work.

use crate::artifacts::ExportFormat;
use crate::error::TrainingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Where model weights are loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// A checkpoint produced by an earlier run.
    Weights(PathBuf),
    /// A pretrained model the library can fetch by name, e.g. `yolov8n.pt`.
    Pretrained(String),
}

impl ModelSource {
    /// The argument the library expects when loading.
    #[must_use]
    pub fn as_argument(&self) -> String {
        match self {
            Self::Weights(path) => path.display().to_string(),
            Self::Pretrained(name) => name.clone(),
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_argument())
    }
}

/// What a training call hands back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendTrainOutput {
    /// Best checkpoint, if the library reported one.
    pub best: Option<PathBuf>,
    /// Run output directory, if the library reported one.
    pub save_dir: Option<PathBuf>,
    /// Raw result map keyed by the library's metric names.
    #[serde(default)]
    pub results: Map<String, Value>,
}

#[async_trait]
pub trait DetectionBackend: Send + Sync {
    fn id(&self) -> &'static str;

    /// Fails with `DependencyMissing` when the library cannot be used.
    fn check_available(&self) -> TrainingResult<()>;

    async fn train(
        &self,
        model: &ModelSource,
        args: &Map<String, Value>,
    ) -> TrainingResult<BackendTrainOutput>;

    async fn validate(&self, weights: &Path, data: &Path) -> TrainingResult<Map<String, Value>>;

    /// Returns the path of the exported artifact, file or directory.
    async fn export(
        &self,
        weights: &Path,
        format: ExportFormat,
        img_size: u32,
    ) -> TrainingResult<PathBuf>;
}
