//! Dataset layout checks and acquisition.

pub mod downloader;
pub mod host;
pub mod manifest;
#[cfg(feature = "roboflow")]
pub mod roboflow;
pub mod validator;

pub use downloader::{
    DataDownloader, DatasetDownloader, DownloadOutcome, DownloadReport, EXPORT_SPLITS,
};
pub use host::{DatasetHost, DatasetRequest};
pub use manifest::{check_manifest, class_names, read_manifest, MANIFEST_FILE, REQUIRED_KEYS};
#[cfg(feature = "roboflow")]
pub use roboflow::RoboflowClient;
pub use validator::{DatasetStats, DatasetValidation, DatasetValidator, Split, SplitComparison};
