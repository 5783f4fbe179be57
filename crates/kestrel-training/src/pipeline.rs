//! Download, prepare, train, evaluate and deploy, in that order.

use crate::artifacts::{ExportRecord, TrainingMetrics, ValidationMetrics};
use crate::error::TrainingResult;
use crate::trainer::Trainer;
use chrono::{DateTime, Utc};
use kestrel_core::DataDownloader;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Export format used by [`TrainingPipeline::run_full_pipeline`].
pub const DEFAULT_DEPLOY_FORMAT: &str = "onnx";

/// Result of a stage that either produces a record or fails with a message.
///
/// Serializes as the record itself, or as `{"success": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageOutcome<T> {
    Completed(T),
    Failed { success: bool, error: String },
}

impl<T> StageOutcome<T> {
    fn from_result(result: TrainingResult<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(e) => Self::Failed { success: false, error: e.to_string() },
        }
    }

    #[must_use]
    pub fn completed(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

impl StageOutcome<TrainingMetrics> {
    fn succeeded(&self) -> bool {
        self.completed().is_some_and(|m| m.success)
    }
}

impl StageOutcome<ExportRecord> {
    fn succeeded(&self) -> bool {
        self.completed().is_some_and(|r| r.success)
    }
}

/// Aggregate of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub download: bool,
    pub preparation: bool,
    pub training: Option<StageOutcome<TrainingMetrics>>,
    pub evaluation: Option<StageOutcome<ValidationMetrics>>,
    pub deployment: Option<StageOutcome<ExportRecord>>,
    pub success: bool,
}

impl PipelineReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            download: false,
            preparation: false,
            training: None,
            evaluation: None,
            deployment: None,
            success: false,
        }
    }

    fn finish(mut self) -> Self {
        self.success = self.download
            && self.preparation
            && self.training.as_ref().is_some_and(|stage| stage.succeeded())
            && self.evaluation.as_ref().is_some_and(|e| e.completed().is_some())
            && self.deployment.as_ref().is_some_and(|stage| stage.succeeded());
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Aggregate of a train, evaluate, export sequence with a known dataset.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRunReport {
    pub training: StageOutcome<TrainingMetrics>,
    pub validation: StageOutcome<ValidationMetrics>,
    pub export: StageOutcome<ExportRecord>,
    pub success: bool,
}

/// Sequences a downloader and a trainer.
pub struct TrainingPipeline<D, T> {
    downloader: D,
    trainer: T,
}

impl<D, T> TrainingPipeline<D, T>
where
    D: DataDownloader,
    T: Trainer,
{
    pub fn new(downloader: D, trainer: T) -> Self {
        info!(trainer = trainer.id(), "training pipeline initialized");
        Self { downloader, trainer }
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub fn trainer_mut(&mut self) -> &mut T {
        &mut self.trainer
    }

    /// Fetch the dataset and clean up scratch directories afterwards.
    pub async fn download_data(&self, force: bool) -> bool {
        info!(force = force, "downloading dataset");
        let outcome = self.downloader.download(force).await;
        if !outcome.success {
            error!(message = %outcome.message, "download failed");
            return false;
        }
        info!(message = %outcome.message, "download complete");
        if !self.downloader.cleanup() {
            warn!("temporary data could not be removed");
        }
        true
    }

    /// Check the downloaded dataset and bind its manifest into the trainer.
    pub fn prepare_data(&mut self) -> bool {
        info!("preparing dataset");
        let (valid, report) = self.downloader.validate();
        if !valid {
            let reason = report.error.as_deref().unwrap_or("unknown error");
            error!(error = reason, "dataset is invalid");
            return false;
        }
        info!(
            train_images = report.train_images,
            classes = report.classes.len(),
            "dataset is valid"
        );

        let manifest = report.manifest_path();
        if !manifest.is_file() {
            error!(path = %manifest.display(), "data.yaml not found");
            return false;
        }
        match self.trainer.set_manifest_path(&manifest) {
            Ok(()) => {
                info!(path = %manifest.display(), "data.yaml bound");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to bind data.yaml");
                false
            }
        }
    }

    pub async fn train_model(&mut self) -> StageOutcome<TrainingMetrics> {
        info!("training model");
        let outcome = StageOutcome::from_result(self.trainer.train(None, false).await);
        match &outcome {
            StageOutcome::Completed(metrics) => {
                info!(
                    map50 = metrics.map50,
                    epochs = metrics.epochs_completed,
                    "training complete"
                );
            }
            StageOutcome::Failed { error, .. } => error!(error = %error, "training failed"),
        }
        outcome
    }

    pub async fn evaluate_model(&mut self) -> StageOutcome<ValidationMetrics> {
        info!("evaluating model");
        let outcome = StageOutcome::from_result(self.trainer.validate().await);
        match &outcome {
            StageOutcome::Completed(metrics) => {
                info!(map50 = metrics.map50, map50_95 = metrics.map50_95, "evaluation complete");
            }
            StageOutcome::Failed { error, .. } => error!(error = %error, "evaluation failed"),
        }
        outcome
    }

    pub async fn deploy_model(&mut self, format: &str) -> StageOutcome<ExportRecord> {
        info!(format = format, "exporting model");
        let outcome = StageOutcome::from_result(self.trainer.export(format, None).await);
        match &outcome {
            StageOutcome::Completed(record) => {
                info!(
                    path = %record.exported_path.display(),
                    size_mb = record.model_size_mb,
                    "export complete"
                );
            }
            StageOutcome::Failed { error, .. } => error!(error = %error, "export failed"),
        }
        outcome
    }

    /// Run every stage, stopping after a failed download, preparation or training.
    pub async fn run_full_pipeline(&mut self, force_download: bool) -> PipelineReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id);
        self.run_stages(run_id, force_download).instrument(span).await
    }

    async fn run_stages(&mut self, run_id: Uuid, force_download: bool) -> PipelineReport {
        info!("starting full pipeline");
        let mut report = PipelineReport::new(run_id);

        report.download = self.download_data(force_download).await;
        if !report.download {
            error!("pipeline stopped: download failed");
            return report.finish();
        }

        report.preparation = self.prepare_data();
        if !report.preparation {
            error!("pipeline stopped: preparation failed");
            return report.finish();
        }

        let training = self.train_model().await;
        let trained = training.succeeded();
        report.training = Some(training);
        if !trained {
            error!("pipeline stopped: training failed");
            return report.finish();
        }

        report.evaluation = Some(self.evaluate_model().await);
        report.deployment = Some(self.deploy_model(DEFAULT_DEPLOY_FORMAT).await);

        let report = report.finish();
        info!(success = report.success, "pipeline finished");
        report
    }

    /// Train, evaluate and export without short-circuiting.
    ///
    /// Binds `manifest` if given; otherwise tries to discover one through the
    /// preparation stage. A manifest that cannot be bound fails the training
    /// stage with that error.
    pub async fn run_training(&mut self, manifest: Option<&Path>) -> TrainingRunReport {
        let mut bind_error = None;
        match manifest {
            Some(path) => match self.trainer.set_manifest_path(path) {
                Ok(()) => info!(path = %path.display(), "using data.yaml"),
                Err(e) => {
                    error!(error = %e, "failed to bind data.yaml");
                    bind_error = Some(e);
                }
            },
            None => {
                if !self.prepare_data() {
                    warn!("no data.yaml discovered; training needs one already bound");
                }
            }
        }

        let training = match bind_error {
            Some(e) => StageOutcome::from_result(Err(e)),
            None => self.train_model().await,
        };
        let validation = self.evaluate_model().await;
        let export = self.deploy_model(DEFAULT_DEPLOY_FORMAT).await;
        let success =
            training.succeeded() && validation.completed().is_some() && export.succeeded();

        TrainingRunReport { training, validation, export, success }
    }
}

impl<D, T: Trainer> std::fmt::Debug for TrainingPipeline<D, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("trainer", &self.trainer.id())
            .field("state", &self.trainer.state())
            .finish_non_exhaustive()
    }
}
