//! Validated training configuration.
//!
//! Hyperparameters come from the `training` section of the settings file and
//! paths from the `paths` section. Every optional field has a default, so an
//! empty settings file still yields a usable configuration.

use crate::error::{TrainingError, TrainingResult};
use crate::layout::RunLayout;
use kestrel_core::config;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

pub const DEFAULT_DATA_DIR: &str = "Dataset_roboflow";
pub const DEFAULT_MODEL_SAVE_DIR: &str = "models/model_yolo";

/// YOLOv8 model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSize {
    Nano,
    Small,
    Medium,
    Large,
    XLarge,
}

impl ModelSize {
    /// Single-letter code used in weight file names.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Nano => "n",
            Self::Small => "s",
            Self::Medium => "m",
            Self::Large => "l",
            Self::XLarge => "x",
        }
    }
}

impl FromStr for ModelSize {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nano" | "n" => Ok(Self::Nano),
            "small" | "s" => Ok(Self::Small),
            "medium" | "m" => Ok(Self::Medium),
            "large" | "l" => Ok(Self::Large),
            "xlarge" | "x" => Ok(Self::XLarge),
            _ => Err(TrainingError::InvalidSpec(format!(
                "invalid model size `{s}` (expected nano, small, medium, large, xlarge or n, s, m, l, x)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Size tag as written in the settings file; also used in the run name.
    pub model_size: String,
    pub batch_size: u32,
    pub epochs: u32,
    pub img_size: u32,
    pub optimizer: String,
    pub lr0: f64,
    pub patience: u32,
    /// Empty selects the device automatically, `"0"` is the first GPU.
    pub device: String,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            model_size: "nano".to_string(),
            batch_size: 16,
            epochs: 100,
            img_size: 640,
            optimizer: "SGD".to_string(),
            lr0: 0.01,
            patience: 50,
            device: String::new(),
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> TrainingResult<()> {
        self.model_size.parse::<ModelSize>()?;
        if self.img_size == 0 || self.img_size % 32 != 0 {
            return Err(TrainingError::InvalidSpec(format!(
                "img_size must be a positive multiple of 32, got {}",
                self.img_size
            )));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidSpec("batch_size must be >= 1".to_string()));
        }
        if self.epochs == 0 {
            return Err(TrainingError::InvalidSpec("epochs must be >= 1".to_string()));
        }
        if self.patience == 0 {
            return Err(TrainingError::InvalidSpec("patience must be >= 1".to_string()));
        }
        if !self.lr0.is_finite() || self.lr0 <= 0.0 {
            return Err(TrainingError::InvalidSpec("lr0 must be > 0".to_string()));
        }
        Ok(())
    }

    /// Parsed size. Only fails on a record that skipped [`Self::validate`].
    pub fn size(&self) -> TrainingResult<ModelSize> {
        self.model_size.parse()
    }
}

/// Filesystem locations used for training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingPaths {
    pub data_dir: PathBuf,
    pub model_save_dir: PathBuf,
    data_yaml_path: Option<PathBuf>,
}

impl TrainingPaths {
    /// Creates both directories if they are absent.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        model_save_dir: impl Into<PathBuf>,
    ) -> TrainingResult<Self> {
        let paths = Self {
            data_dir: data_dir.into(),
            model_save_dir: model_save_dir.into(),
            data_yaml_path: None,
        };
        for dir in [&paths.data_dir, &paths.model_save_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!(path = %dir.display(), "created directory");
            }
        }
        Ok(paths)
    }

    #[must_use]
    pub fn data_yaml_path(&self) -> Option<&Path> {
        self.data_yaml_path.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct PathsSection {
    data_dir: PathBuf,
    model_save_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            model_save_dir: PathBuf::from(DEFAULT_MODEL_SAVE_DIR),
        }
    }
}

/// Hyperparameters plus paths, validated on construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    hyperparameters: Hyperparameters,
    pub paths: TrainingPaths,
}

impl TrainingConfig {
    pub fn new(hyperparameters: Hyperparameters, paths: TrainingPaths) -> TrainingResult<Self> {
        hyperparameters.validate()?;
        Ok(Self { hyperparameters, paths })
    }

    /// Load from a settings file.
    pub fn from_file(path: impl AsRef<Path>) -> TrainingResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrainingError::NotFound(path.to_path_buf()));
        }
        let config = config::load(path)?;
        Self::from_config(&config)
    }

    /// Build from an already loaded configuration mapping.
    pub fn from_config(config: &Value) -> TrainingResult<Self> {
        let hyperparameters: Hyperparameters =
            serde_yaml::from_value(config::section(config, "training"))
                .map_err(|e| TrainingError::Config(format!("training section: {e}")))?;
        let paths: PathsSection = serde_yaml::from_value(config::section(config, "paths"))
            .map_err(|e| TrainingError::Config(format!("paths section: {e}")))?;

        let paths = TrainingPaths::new(paths.data_dir, paths.model_save_dir)?;
        Self::new(hyperparameters, paths)
    }

    #[must_use]
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Replace the hyperparameters, keeping the old ones if the new set is invalid.
    pub fn set_hyperparameters(&mut self, hyperparameters: Hyperparameters) -> TrainingResult<()> {
        hyperparameters.validate()?;
        self.hyperparameters = hyperparameters;
        Ok(())
    }

    #[must_use]
    pub fn manifest_path(&self) -> Option<&Path> {
        self.paths.data_yaml_path()
    }

    /// Bind the dataset manifest. The file must exist now.
    pub fn set_manifest_path(&mut self, path: impl AsRef<Path>) -> TrainingResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrainingError::NotFound(path.to_path_buf()));
        }
        self.paths.data_yaml_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Pretrained weights name, e.g. `yolov8n.pt`.
    pub fn model_identifier(&self) -> TrainingResult<String> {
        Ok(format!("yolov8{}.pt", self.hyperparameters.size()?.code()))
    }

    /// `yolov8_<size>_<imgsize>px`, using the size tag as configured.
    #[must_use]
    pub fn run_name(&self) -> String {
        format!(
            "yolov8_{}_{}px",
            self.hyperparameters.model_size, self.hyperparameters.img_size
        )
    }

    #[must_use]
    pub fn run_layout(&self) -> RunLayout {
        RunLayout::new(self.paths.model_save_dir.clone(), self.run_name())
    }

    /// Keyword arguments for the detection library's train call.
    #[must_use]
    pub fn training_arguments(&self) -> Map<String, JsonValue> {
        let hp = &self.hyperparameters;
        let data = self
            .manifest_path()
            .map_or(JsonValue::Null, |p| JsonValue::String(p.display().to_string()));

        let mut args = Map::new();
        args.insert("data".to_string(), data);
        args.insert("epochs".to_string(), json!(hp.epochs));
        args.insert("patience".to_string(), json!(hp.patience));
        args.insert("batch".to_string(), json!(hp.batch_size));
        args.insert("imgsz".to_string(), json!(hp.img_size));
        args.insert("optimizer".to_string(), json!(hp.optimizer));
        args.insert("lr0".to_string(), json!(hp.lr0));
        args.insert("device".to_string(), json!(hp.device));
        args.insert(
            "project".to_string(),
            json!(self.paths.model_save_dir.display().to_string()),
        );
        args.insert("name".to_string(), json!(self.run_name()));
        args.insert("exist_ok".to_string(), json!(true));
        args.insert("pretrained".to_string(), json!(true));
        args.insert("verbose".to_string(), json!(true));
        args
    }
}

impl std::fmt::Display for TrainingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hp = &self.hyperparameters;
        writeln!(f, "TrainingConfig:")?;
        writeln!(f, "  Model: YOLOv8 {}", hp.model_size)?;
        writeln!(f, "  Batch size: {}", hp.batch_size)?;
        writeln!(f, "  Epochs: {}", hp.epochs)?;
        writeln!(f, "  Image size: {}px", hp.img_size)?;
        writeln!(f, "  Optimizer: {}", hp.optimizer)?;
        writeln!(f, "  Learning rate: {}", hp.lr0)?;
        if let Some(dataset) = self
            .manifest_path()
            .and_then(Path::parent)
            .and_then(Path::file_name)
        {
            writeln!(f, "  Dataset: {}", dataset.to_string_lossy())?;
        }
        Ok(())
    }
}
