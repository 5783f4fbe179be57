//! Typed views over the settings file.

use crate::config::requirements::{self, Requirements, ValueKind};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::PathBuf;

/// Connection and export coordinates for the dataset hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoboflowSettings {
    pub api_key: String,
    pub workspace: String,
    pub project: String,
    pub version: String,
    pub format: String,
}

/// Everything the downloader needs from the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderSettings {
    pub roboflow: RoboflowSettings,
    /// Root under which `<project>/` is downloaded.
    pub processed_data_dir: PathBuf,
}

impl DownloaderSettings {
    /// Fields the downloader refuses to start without.
    #[must_use]
    pub fn requirements() -> Requirements {
        Requirements::new()
            .typed("roboflow.api_key", ValueKind::String)
            .typed("roboflow.workspace", ValueKind::String)
            .typed("roboflow.project", ValueKind::String)
            .typed("roboflow.version", ValueKind::String)
            .typed("roboflow.format", ValueKind::String)
            .typed("paths.processed_data_dir", ValueKind::String)
    }

    /// Project the downloader settings out of a loaded configuration mapping.
    ///
    /// # Errors
    ///
    /// `CoreError::ConfigIncomplete` if any required field is missing or mistyped.
    pub fn from_config(config: &Value) -> CoreResult<Self> {
        if !requirements::validate(config, &Self::requirements()) {
            return Err(CoreError::ConfigIncomplete(
                "roboflow.{api_key,workspace,project,version,format} and paths.processed_data_dir must be strings"
                    .to_string(),
            ));
        }

        let roboflow: RoboflowSettings = serde_yaml::from_value(config["roboflow"].clone())
            .map_err(|e| CoreError::ConfigIncomplete(format!("roboflow section: {e}")))?;
        let processed_data_dir = requirements::lookup(config, "paths.processed_data_dir")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .ok_or_else(|| CoreError::ConfigIncomplete("paths.processed_data_dir".to_string()))?;

        Ok(Self { roboflow, processed_data_dir })
    }
}

/// Clone a top-level section, or an empty mapping if it is absent or not a mapping.
#[must_use]
pub fn section(config: &Value, name: &str) -> Value {
    match config.get(name) {
        Some(value @ Value::Mapping(_)) => value.clone(),
        _ => Value::Mapping(serde_yaml::Mapping::new()),
    }
}
