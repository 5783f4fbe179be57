//! Kestrel Training
//!
//! YOLOv8 training on top of kestrel-core:
//! - Validated hyperparameters and paths (`TrainingConfig`)
//! - The detection library seam (`DetectionBackend`) and its Ultralytics implementation
//! - A stateful trainer (`YoloTrainer`) producing metrics and export records
//! - The download → prepare → train → evaluate → deploy pipeline

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod trainer;
pub mod ultralytics;

pub use artifacts::{sha256_file, ExportFormat, ExportRecord, TrainingMetrics, ValidationMetrics};
pub use backend::{BackendTrainOutput, DetectionBackend, ModelSource};
pub use config::{Hyperparameters, ModelSize, TrainingConfig, TrainingPaths};
pub use error::{TrainingError, TrainingResult};
pub use layout::RunLayout;
pub use pipeline::{
    PipelineReport, StageOutcome, TrainingPipeline, TrainingRunReport, DEFAULT_DEPLOY_FORMAT,
};
pub use trainer::{Trainer, TrainerState, YoloTrainer};
pub use ultralytics::UltralyticsBackend;
