#![allow(dead_code)]

use async_trait::async_trait;
use kestrel_core::{
    CoreError, CoreResult, DatasetHost, DatasetRequest, DownloaderSettings, RoboflowSettings,
};
use kestrel_training::{
    BackendTrainOutput, DetectionBackend, ExportFormat, Hyperparameters, ModelSource,
    TrainingConfig, TrainingError, TrainingPaths, TrainingResult,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const MANIFEST: &str = "\
path: .
train: train/images
val: valid/images
test: test/images
names:
  0: sparrow
  1: finch
";

/// Backend that writes plausible run output instead of training anything.
#[derive(Default)]
pub struct FakeBackend {
    pub unavailable: bool,
    pub train_error: Option<String>,
    pub export_error: Option<String>,
    /// Report exports through a `weights/../weights/` spelling of their directory.
    pub alias_exports: bool,
    pub models: Mutex<Vec<ModelSource>>,
    pub train_args: Mutex<Vec<Map<String, Value>>>,
    pub validations: AtomicUsize,
}

impl FakeBackend {
    pub fn last_args(&self) -> Map<String, Value> {
        self.train_args.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn last_model(&self) -> Option<ModelSource> {
        self.models.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DetectionBackend for FakeBackend {
    fn id(&self) -> &'static str {
        "fake"
    }

    fn check_available(&self) -> TrainingResult<()> {
        if self.unavailable {
            return Err(TrainingError::DependencyMissing("fake library not installed".to_string()));
        }
        Ok(())
    }

    async fn train(
        &self,
        model: &ModelSource,
        args: &Map<String, Value>,
    ) -> TrainingResult<BackendTrainOutput> {
        self.models.lock().unwrap().push(model.clone());
        self.train_args.lock().unwrap().push(args.clone());
        if let Some(message) = &self.train_error {
            return Err(TrainingError::RuntimeFailure(message.clone()));
        }

        let project = PathBuf::from(args["project"].as_str().unwrap_or_default());
        let save_dir = project.join(args["name"].as_str().unwrap_or_default());
        std::fs::create_dir_all(save_dir.join("weights"))?;
        let best = save_dir.join("weights/best.pt");
        std::fs::write(&best, vec![1_u8; 2048])?;
        std::fs::write(save_dir.join("weights/last.pt"), vec![2_u8; 2048])?;

        let results = json!({
            "metrics/precision(B)": 0.91,
            "metrics/recall(B)": 0.84,
            "metrics/mAP50(B)": 0.88,
            "metrics/mAP50-95(B)": 0.61,
            "epoch": args["epochs"].as_u64().unwrap_or(0),
        });
        Ok(BackendTrainOutput {
            best: Some(best),
            save_dir: Some(save_dir),
            results: results.as_object().cloned().unwrap_or_default(),
        })
    }

    async fn validate(&self, _weights: &Path, _data: &Path) -> TrainingResult<Map<String, Value>> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        let results = json!({
            "metrics/precision(B)": 0.9,
            "metrics/mAP50(B)": 0.87,
        });
        Ok(results.as_object().cloned().unwrap_or_default())
    }

    async fn export(
        &self,
        weights: &Path,
        format: ExportFormat,
        _img_size: u32,
    ) -> TrainingResult<PathBuf> {
        if let Some(message) = &self.export_error {
            return Err(TrainingError::RuntimeFailure(message.clone()));
        }
        let dir = weights.parent().unwrap_or_else(|| Path::new("."));
        let reported = |out: PathBuf| match out.file_name() {
            Some(name) if self.alias_exports => dir.join("..").join("weights").join(name),
            _ => out,
        };
        match format {
            ExportFormat::Openvino | ExportFormat::SavedModel => {
                let out = dir.join(format!("best_{format}_model"));
                std::fs::create_dir_all(&out)?;
                std::fs::write(out.join("model.bin"), vec![0_u8; 1024])?;
                Ok(reported(out))
            }
            _ => {
                let out = dir.join(format!("best.{format}"));
                std::fs::write(&out, vec![0_u8; 3 * 1024 * 1024])?;
                Ok(reported(out))
            }
        }
    }
}

/// Host that counts calls and lays out a small export.
#[derive(Default)]
pub struct CountingHost {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingHost {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetHost for CountingHost {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn fetch(&self, request: &DatasetRequest, destination: &Path) -> CoreResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CoreError::Download("quota exceeded".to_string()));
        }
        let target = destination.join(&request.project);
        write_export(&target);
        Ok(target)
    }
}

/// `<project>/{train,valid,test}/images` with two images each, plus data.yaml.
pub fn write_export(project: &Path) {
    for split in ["train", "valid", "test"] {
        let images = project.join(split).join("images");
        let labels = project.join(split).join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();
        for stem in ["a", "b"] {
            std::fs::write(images.join(format!("{stem}.jpg")), b"jpg").unwrap();
            std::fs::write(labels.join(format!("{stem}.txt")), b"0 0.5 0.5 0.1 0.1\n").unwrap();
        }
    }
    std::fs::write(project.join("data.yaml"), MANIFEST).unwrap();
}

pub fn training_config(root: &Path) -> TrainingConfig {
    let paths = TrainingPaths::new(root.join("data"), root.join("models")).unwrap();
    let hyperparameters = Hyperparameters { epochs: 3, ..Hyperparameters::default() };
    TrainingConfig::new(hyperparameters, paths).unwrap()
}

pub fn downloader_settings(root: &Path) -> DownloaderSettings {
    DownloaderSettings {
        roboflow: RoboflowSettings {
            api_key: "key".to_string(),
            workspace: "ws".to_string(),
            project: "birds".to_string(),
            version: "1".to_string(),
            format: "yolov8".to_string(),
        },
        processed_data_dir: root.join("data"),
    }
}
