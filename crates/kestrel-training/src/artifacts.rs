use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Result keys reported by the detection library.
pub mod keys {
    pub const PRECISION: &str = "metrics/precision(B)";
    pub const RECALL: &str = "metrics/recall(B)";
    pub const MAP50: &str = "metrics/mAP50(B)";
    pub const MAP50_95: &str = "metrics/mAP50-95(B)";
    pub const VAL_BOX_LOSS: &str = "val/box_loss";
    pub const EPOCH: &str = "epoch";
}

fn metric(results: &Map<String, Value>, key: &str) -> f64 {
    results.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub success: bool,
    pub model_path: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "mAP50")]
    pub map50: f64,
    #[serde(rename = "mAP50-95")]
    pub map50_95: f64,
    pub val_loss: f64,
    pub epochs_completed: u64,
}

impl TrainingMetrics {
    /// Pick the headline metrics out of a library result map. Absent keys are zero.
    #[must_use]
    pub fn from_results(
        results: &Map<String, Value>,
        model_path: Option<PathBuf>,
        results_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            success: true,
            model_path,
            results_dir,
            precision: metric(results, keys::PRECISION),
            recall: metric(results, keys::RECALL),
            map50: metric(results, keys::MAP50),
            map50_95: metric(results, keys::MAP50_95),
            val_loss: metric(results, keys::VAL_BOX_LOSS),
            epochs_completed: metric(results, keys::EPOCH).max(0.0) as u64,
        }
    }
}

/// Headline metrics from a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "mAP50")]
    pub map50: f64,
    #[serde(rename = "mAP50-95")]
    pub map50_95: f64,
}

impl ValidationMetrics {
    #[must_use]
    pub fn from_results(results: &Map<String, Value>) -> Self {
        Self {
            precision: metric(results, keys::PRECISION),
            recall: metric(results, keys::RECALL),
            map50: metric(results, keys::MAP50),
            map50_95: metric(results, keys::MAP50_95),
        }
    }
}

/// Formats the detection library can export to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Onnx,
    Torchscript,
    Openvino,
    Coreml,
    Tflite,
    SavedModel,
    Pb,
    Trt,
}

impl ExportFormat {
    pub const ALL: [Self; 8] = [
        Self::Onnx,
        Self::Torchscript,
        Self::Openvino,
        Self::Coreml,
        Self::Tflite,
        Self::SavedModel,
        Self::Pb,
        Self::Trt,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Torchscript => "torchscript",
            Self::Openvino => "openvino",
            Self::Coreml => "coreml",
            Self::Tflite => "tflite",
            Self::SavedModel => "saved_model",
            Self::Pb => "pb",
            Self::Trt => "trt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == lower)
            .ok_or_else(|| TrainingError::UnsupportedFormat(s.to_string()))
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an exported model ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub success: bool,
    pub format: ExportFormat,
    pub exported_path: PathBuf,
    pub model_size_mb: f64,
    /// Absent for directory artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ExportRecord {
    /// Describe an artifact already in its final location.
    pub fn for_artifact(format: ExportFormat, exported_path: PathBuf) -> TrainingResult<Self> {
        if !exported_path.exists() {
            return Err(TrainingError::NotFound(exported_path));
        }
        let sha256 = if exported_path.is_file() {
            Some(sha256_file(&exported_path)?)
        } else {
            None
        };
        Ok(Self {
            success: true,
            format,
            model_size_mb: mebibytes(artifact_size(&exported_path)?),
            exported_path,
            sha256,
        })
    }
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Size in bytes of a file, or of every file under a directory.
pub fn artifact_size(path: &Path) -> TrainingResult<u64> {
    if path.is_file() {
        return Ok(std::fs::metadata(path)?.len());
    }
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| TrainingError::Io(e.into()))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| TrainingError::Io(e.into()))?.len();
        }
    }
    Ok(total)
}

/// Bytes to MiB, rounded to two decimals.
#[must_use]
pub fn mebibytes(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Whether `path` sits directly inside `dir`, comparing resolved locations.
#[must_use]
pub fn is_in_dir(path: &Path, dir: &Path) -> bool {
    let parent = path
        .parent()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .and_then(|p| std::fs::canonicalize(p).ok());
    parent.is_some() && parent == std::fs::canonicalize(dir).ok()
}

/// Copy a file or directory artifact into `dir`, keeping its name.
///
/// An artifact that already is the target is left alone.
pub fn copy_artifact(source: &Path, dir: &Path) -> TrainingResult<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        TrainingError::RuntimeFailure(format!("artifact has no file name: {}", source.display()))
    })?;
    let target = dir.join(name);

    if target.exists() && std::fs::canonicalize(source)? == std::fs::canonicalize(&target)? {
        return Ok(target);
    }

    if source.is_file() {
        std::fs::copy(source, &target)?;
        return Ok(target);
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| TrainingError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| TrainingError::RuntimeFailure(e.to_string()))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            std::fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(target)
}
