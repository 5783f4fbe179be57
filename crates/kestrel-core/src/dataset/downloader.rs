//! Dataset download, post-download checks and scratch cleanup.

use crate::config::DownloaderSettings;
use crate::dataset::host::{DatasetHost, DatasetRequest};
use crate::dataset::manifest::{self, MANIFEST_FILE};
use crate::dataset::validator::count_images;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Split directories a downloaded export must contain.
pub const EXPORT_SPLITS: [&str; 3] = ["train", "valid", "test"];

/// Directories whose name contains this token are scratch space.
const TEMPORARY_MARKER: &str = "tmp";

const WRITE_MARKER: &str = ".write_test";

/// Result of a download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
}

impl DownloadOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Structure check of a downloaded export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub valid: bool,
    /// The project directory, parent of `data.yaml`.
    pub path: PathBuf,
    pub project: String,
    pub version: String,
    pub format: String,
    pub train_images: usize,
    pub valid_images: usize,
    pub test_images: usize,
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadReport {
    fn fail(mut self, error: String) -> (bool, Self) {
        warn!(error = %error, "downloaded dataset is incomplete");
        self.valid = false;
        self.error = Some(error);
        (false, self)
    }

    /// Manifest path inside the downloaded project.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }
}

/// Operations the training pipeline needs from a dataset source.
#[async_trait]
pub trait DataDownloader: Send + Sync {
    /// Fetch the dataset unless it is already present. Never fails; errors are
    /// folded into the outcome.
    async fn download(&self, force: bool) -> DownloadOutcome;

    /// Check the downloaded structure and count its images.
    fn validate(&self) -> (bool, DownloadReport);

    /// Remove scratch directories under the destination.
    fn cleanup(&self) -> bool;
}

/// Downloads a dataset version from a [`DatasetHost`] into a local directory.
pub struct DatasetDownloader {
    settings: DownloaderSettings,
    host: Arc<dyn DatasetHost>,
}

impl std::fmt::Debug for DatasetDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetDownloader")
            .field("project", &self.settings.roboflow.project)
            .field("destination", &self.settings.processed_data_dir)
            .field("host", &self.host.name())
            .finish()
    }
}

impl DatasetDownloader {
    /// Creates a downloader, making sure the destination is writable.
    ///
    /// # Errors
    ///
    /// `CoreError::PermissionDenied` if the destination cannot be created or written.
    pub fn new(settings: DownloaderSettings, host: Arc<dyn DatasetHost>) -> CoreResult<Self> {
        ensure_writable(&settings.processed_data_dir)?;
        Ok(Self { settings, host })
    }

    /// Creates a downloader from a loaded configuration mapping.
    ///
    /// # Errors
    ///
    /// `CoreError::ConfigIncomplete` for missing settings, `CoreError::PermissionDenied`
    /// for an unusable destination.
    pub fn from_config(config: &serde_yaml::Value, host: Arc<dyn DatasetHost>) -> CoreResult<Self> {
        let settings = DownloaderSettings::from_config(config)?;
        Self::new(settings, host)
    }

    /// Creates a downloader backed by the Roboflow client.
    ///
    /// # Errors
    ///
    /// `CoreError::DependencyMissing` when built without the `roboflow` feature,
    /// otherwise the errors of [`crate::config::load`] and [`Self::from_config`].
    pub fn from_config_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        #[cfg(not(feature = "roboflow"))]
        {
            let _ = path;
            error!("roboflow client is not available in this build");
            Err(CoreError::DependencyMissing(
                "roboflow client not enabled in this build; rebuild with the `roboflow` feature"
                    .to_string(),
            ))
        }

        #[cfg(feature = "roboflow")]
        {
            let config = crate::config::load(path)?;
            let settings = DownloaderSettings::from_config(&config)?;
            let host = Arc::new(crate::dataset::roboflow::RoboflowClient::new(
                settings.roboflow.api_key.clone(),
            ));
            Self::new(settings, host)
        }
    }

    #[must_use]
    pub fn settings(&self) -> &DownloaderSettings {
        &self.settings
    }

    /// Root directory downloads land under.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.settings.processed_data_dir
    }

    /// `<destination>/<project>`.
    #[must_use]
    pub fn project_dir(&self) -> PathBuf {
        self.settings.processed_data_dir.join(&self.settings.roboflow.project)
    }
}

#[async_trait]
impl DataDownloader for DatasetDownloader {
    async fn download(&self, force: bool) -> DownloadOutcome {
        let project_dir = self.project_dir();
        if project_dir.exists() && !force {
            info!(path = %project_dir.display(), "dataset already exists, skipping download");
            let message = format!("dataset already exists at {}", project_dir.display());
            return DownloadOutcome::ok(message);
        }

        let roboflow = &self.settings.roboflow;
        let request = DatasetRequest::from(roboflow);
        match self.host.fetch(&request, self.destination()).await {
            Ok(dir) => {
                info!(
                    host = self.host.name(),
                    project = %roboflow.project,
                    version = %roboflow.version,
                    path = %dir.display(),
                    "dataset downloaded"
                );
                DownloadOutcome::ok(format!("dataset downloaded to {}", dir.display()))
            }
            Err(e) => {
                let message = format!("failed to download dataset: {e}");
                error!(host = self.host.name(), error = %e, "dataset download failed");
                DownloadOutcome::failed(message)
            }
        }
    }

    fn validate(&self) -> (bool, DownloadReport) {
        let roboflow = &self.settings.roboflow;
        let data_dir = self.project_dir();
        let mut report = DownloadReport {
            valid: true,
            path: data_dir.clone(),
            project: roboflow.project.clone(),
            version: roboflow.version.clone(),
            format: roboflow.format.clone(),
            ..DownloadReport::default()
        };

        if !data_dir.is_dir() {
            return report.fail(format!("dataset directory not found: {}", data_dir.display()));
        }

        for split in EXPORT_SPLITS {
            let split_dir = data_dir.join(split);
            if !split_dir.is_dir() {
                return report.fail(format!("required directory not found: {split}"));
            }
            let count = count_images(&split_dir.join("images"));
            match split {
                "train" => report.train_images = count,
                "valid" => report.valid_images = count,
                _ => report.test_images = count,
            }
        }

        let manifest_path = data_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return report.fail(format!("required file not found: {MANIFEST_FILE}"));
        }

        match manifest::read_manifest(&manifest_path) {
            Ok(manifest) => report.classes = manifest::class_names(&manifest),
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "could not read class names");
            }
        }

        info!(
            path = %data_dir.display(),
            train = report.train_images,
            valid = report.valid_images,
            test = report.test_images,
            classes = report.classes.len(),
            "downloaded dataset checked"
        );
        (true, report)
    }

    fn cleanup(&self) -> bool {
        match remove_temporary_dirs(self.destination()) {
            Ok(removed) => {
                info!(removed = removed, "temporary data cleaned up");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to clean up temporary data");
                false
            }
        }
    }
}

fn remove_temporary_dirs(root: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        let is_temporary = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.to_lowercase().contains(TEMPORARY_MARKER));
        if is_temporary && path.is_dir() {
            info!(path = %path.display(), "removing temporary directory");
            std::fs::remove_dir_all(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Create `dir` if needed and prove it is writable with a marker file.
fn ensure_writable(dir: &Path) -> CoreResult<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| {
            error!(path = %dir.display(), error = %e, "failed to create destination directory");
            CoreError::PermissionDenied { path: dir.to_path_buf(), reason: e.to_string() }
        })?;
        info!(path = %dir.display(), "destination directory created");
    }

    let marker = dir.join(WRITE_MARKER);
    std::fs::write(&marker, b"test")
        .and_then(|()| std::fs::remove_file(&marker))
        .map_err(|e| {
            error!(path = %dir.display(), error = %e, "destination directory is not writable");
            CoreError::PermissionDenied { path: dir.to_path_buf(), reason: e.to_string() }
        })
}
