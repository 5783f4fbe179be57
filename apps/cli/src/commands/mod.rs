//! One module per `--mode`.
//!
//! Each `execute` returns `Ok(true)` on success, `Ok(false)` when the run
//! completed but failed, and `Err` when the pipeline could not be built.

pub mod download;
pub mod pipeline;
pub mod train;
pub mod validate;

use anyhow::Context;
use kestrel_core::DatasetDownloader;
use kestrel_training::{TrainingConfig, TrainingPipeline, UltralyticsBackend, YoloTrainer};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub type Pipeline = TrainingPipeline<DatasetDownloader, YoloTrainer>;

/// Wire the Roboflow downloader and the Ultralytics trainer from one settings file.
pub fn build_pipeline(config_path: &Path) -> anyhow::Result<Pipeline> {
    info!(config = %config_path.display(), "building pipeline");

    let config = TrainingConfig::from_file(config_path).with_context(|| {
        format!("failed to load training configuration from {}", config_path.display())
    })?;
    info!("training configuration loaded\n{config}");

    let downloader =
        DatasetDownloader::from_config_file(config_path).context("failed to create downloader")?;
    let trainer = YoloTrainer::new(config, Arc::new(UltralyticsBackend::new()))
        .context("failed to create trainer")?;

    Ok(TrainingPipeline::new(downloader, trainer))
}

/// Log a final record as a single JSON document.
pub fn log_report<T: Serialize>(name: &str, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(report)?;
    info!(report = %json, "{name} report");
    Ok(())
}
