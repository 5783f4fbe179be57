//! Dataset hosting service abstraction.

use crate::config::RoboflowSettings;
use crate::error::CoreResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Coordinates of one exported dataset version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRequest {
    pub workspace: String,
    pub project: String,
    pub version: String,
    pub format: String,
}

impl From<&RoboflowSettings> for DatasetRequest {
    fn from(settings: &RoboflowSettings) -> Self {
        Self {
            workspace: settings.workspace.clone(),
            project: settings.project.clone(),
            version: settings.version.clone(),
            format: settings.format.clone(),
        }
    }
}

/// A service that can materialize a dataset version on local disk.
#[async_trait]
pub trait DatasetHost: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch `request` into `<destination>/<project>` and return that directory.
    async fn fetch(&self, request: &DatasetRequest, destination: &Path) -> CoreResult<PathBuf>;
}
