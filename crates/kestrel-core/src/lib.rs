//! Kestrel Core
//!
//! Foundations shared by the training pipeline:
//! - Loading YAML settings with `${VAR}` / `${VAR:default}` substitution
//! - Checking required settings by dotted path
//! - Validating YOLO-layout datasets and their `data.yaml` manifest
//! - Downloading dataset exports from a hosting service

pub mod config;
pub mod dataset;
pub mod error;

pub use config::{DownloaderSettings, Requirements, RoboflowSettings, ValueKind};
pub use dataset::{
    DataDownloader, DatasetDownloader, DatasetHost, DatasetRequest, DatasetStats, DatasetValidation,
    DatasetValidator, DownloadOutcome, DownloadReport, Split,
};
pub use error::{CoreError, CoreResult};
