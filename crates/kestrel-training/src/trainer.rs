use crate::artifacts::{
    copy_artifact, is_in_dir, ExportFormat, ExportRecord, TrainingMetrics, ValidationMetrics,
};
use crate::backend::{DetectionBackend, ModelSource};
use crate::config::TrainingConfig;
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Lifecycle of a trainer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Uninitialized,
    ModelLoaded,
    Trained,
    Validated,
    Exported,
}

#[async_trait]
pub trait Trainer: Send {
    fn id(&self) -> &'static str;

    fn state(&self) -> TrainerState;

    /// Bind the dataset manifest used by later calls.
    fn set_manifest_path(&mut self, path: &Path) -> TrainingResult<()>;

    async fn train(
        &mut self,
        manifest: Option<&Path>,
        resume: bool,
    ) -> TrainingResult<TrainingMetrics>;

    async fn validate(&mut self) -> TrainingResult<ValidationMetrics>;

    async fn export(
        &mut self,
        format: &str,
        output_dir: Option<&Path>,
    ) -> TrainingResult<ExportRecord>;
}

/// YOLOv8 trainer over a [`DetectionBackend`].
pub struct YoloTrainer {
    config: TrainingConfig,
    backend: Arc<dyn DetectionBackend>,
    state: TrainerState,
    model_path: Option<PathBuf>,
    results_dir: Option<PathBuf>,
}

impl std::fmt::Debug for YoloTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloTrainer")
            .field("backend", &self.backend.id())
            .field("state", &self.state)
            .field("model_path", &self.model_path)
            .field("results_dir", &self.results_dir)
            .finish_non_exhaustive()
    }
}

impl YoloTrainer {
    /// Fails with `DependencyMissing` if the backend cannot run.
    pub fn new(config: TrainingConfig, backend: Arc<dyn DetectionBackend>) -> TrainingResult<Self> {
        if let Err(e) = backend.check_available() {
            error!(backend = backend.id(), error = %e, "detection backend unavailable");
            return Err(e);
        }
        info!(backend = backend.id(), "trainer initialized\n{config}");
        Ok(Self {
            config,
            backend,
            state: TrainerState::Uninitialized,
            model_path: None,
            results_dir: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TrainingConfig {
        &mut self.config
    }

    /// Best weights of the last successful run.
    #[must_use]
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    #[must_use]
    pub fn results_dir(&self) -> Option<&Path> {
        self.results_dir.as_deref()
    }

    /// Pick the starting weights: the last checkpoint when resuming, then the
    /// best weights of an earlier run, then the pretrained model.
    fn load_model(&mut self, resume: bool) -> TrainingResult<ModelSource> {
        let last = Some(self.config.run_layout().last_weights()).filter(|p| resume && p.is_file());
        let source = match last.or_else(|| self.model_path.clone().filter(|p| p.exists())) {
            Some(path) => {
                info!(path = %path.display(), "loading trained model");
                ModelSource::Weights(path)
            }
            None => {
                let name = self.config.model_identifier()?;
                info!(model = %name, "loading pretrained model");
                ModelSource::Pretrained(name)
            }
        };
        self.state = TrainerState::ModelLoaded;
        Ok(source)
    }

    fn trained_weights(&self) -> TrainingResult<PathBuf> {
        match &self.model_path {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => {
                error!(path = %path.display(), "trained model not found");
                Err(TrainingError::NotFound(path.clone()))
            }
            None => {
                error!("no trained model; run train first");
                Err(TrainingError::NotFound(self.config.run_layout().best_weights()))
            }
        }
    }

    fn require_manifest(&self) -> TrainingResult<PathBuf> {
        self.config.manifest_path().map(Path::to_path_buf).ok_or_else(|| {
            error!("dataset manifest not configured");
            TrainingError::Config(
                "dataset manifest not configured; pass or bind a data.yaml first".to_string(),
            )
        })
    }
}

#[async_trait]
impl Trainer for YoloTrainer {
    fn id(&self) -> &'static str {
        "yolov8"
    }

    fn state(&self) -> TrainerState {
        self.state
    }

    fn set_manifest_path(&mut self, path: &Path) -> TrainingResult<()> {
        self.config.set_manifest_path(path)
    }

    async fn train(
        &mut self,
        manifest: Option<&Path>,
        resume: bool,
    ) -> TrainingResult<TrainingMetrics> {
        if let Some(path) = manifest {
            self.config.set_manifest_path(path)?;
        }
        self.require_manifest()?;

        let model = self.load_model(resume)?;
        let mut args = self.config.training_arguments();
        if resume && self.results_dir.as_ref().is_some_and(|dir| dir.exists()) {
            args.insert("resume".to_string(), Value::Bool(true));
        }
        info!(args = %serde_json::Value::Object(args.clone()), "starting training");

        let output = self.backend.train(&model, &args).await.map_err(|e| {
            error!(error = %e, "training failed");
            TrainingError::TrainingFailure(e.to_string())
        })?;

        let layout = self.config.run_layout();
        let best = output.best.filter(|p| p.exists()).or_else(|| layout.existing_best_weights());
        if let Some(best) = best {
            info!(path = %best.display(), "best model saved");
            self.model_path = Some(best);
        }
        if let Some(dir) = output.save_dir.filter(|p| p.exists()) {
            info!(path = %dir.display(), "training results saved");
            self.results_dir = Some(dir);
        } else if layout.run_dir().is_dir() {
            self.results_dir = Some(layout.run_dir());
        }

        self.state = TrainerState::Trained;
        Ok(TrainingMetrics::from_results(
            &output.results,
            self.model_path.clone(),
            self.results_dir.clone(),
        ))
    }

    async fn validate(&mut self) -> TrainingResult<ValidationMetrics> {
        let weights = self.trained_weights()?;
        let data = self.require_manifest()?;

        info!(path = %weights.display(), "validating model");
        let results = self.backend.validate(&weights, &data).await.map_err(|e| {
            error!(error = %e, "validation failed");
            TrainingError::RuntimeFailure(format!("validation failed: {e}"))
        })?;

        let metrics = ValidationMetrics::from_results(&results);
        info!(map50 = metrics.map50, map50_95 = metrics.map50_95, "validation complete");
        self.state = TrainerState::Validated;
        Ok(metrics)
    }

    async fn export(
        &mut self,
        format: &str,
        output_dir: Option<&Path>,
    ) -> TrainingResult<ExportRecord> {
        let weights = self.trained_weights()?;
        let format: ExportFormat =
            format.parse().inspect_err(|e| error!(error = %e, "export rejected"))?;

        let output_dir = match output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.to_path_buf()
            }
            None => weights.parent().map_or_else(PathBuf::new, Path::to_path_buf),
        };

        info!(format = %format, "exporting model");
        let img_size = self.config.hyperparameters().img_size;
        let export = async {
            let mut exported = self.backend.export(&weights, format, img_size).await?;
            if !is_in_dir(&exported, &output_dir) {
                exported = copy_artifact(&exported, &output_dir)?;
                info!(path = %exported.display(), "exported model copied");
            }
            ExportRecord::for_artifact(format, exported)
        };
        let record = export.await.map_err(|e| {
            error!(error = %e, "export failed");
            TrainingError::RuntimeFailure(format!("export failed: {e}"))
        })?;

        self.state = TrainerState::Exported;
        Ok(record)
    }
}
