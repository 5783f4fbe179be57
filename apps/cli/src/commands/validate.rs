use anyhow::Context;
use kestrel_core::config;
use kestrel_core::{DatasetValidation, DatasetValidator};
use kestrel_training::config::DEFAULT_DATA_DIR;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Check a dataset root. Without `--dataset`, uses `paths.data_dir` from the settings file.
pub fn execute(config_path: &Path, dataset: Option<&Path>) -> anyhow::Result<bool> {
    let root = match dataset {
        Some(root) => root.to_path_buf(),
        None => configured_data_dir(config_path)?,
    };
    info!(path = %root.display(), "validating dataset");

    let (ok, stats) = DatasetValidator::new().validate(&root);
    super::log_report("validation", &stats)?;
    Ok(ok)
}

fn configured_data_dir(config_path: &Path) -> anyhow::Result<PathBuf> {
    let settings = config::load(config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;

    match config::lookup(&settings, "paths.data_dir").and_then(serde_yaml::Value::as_str) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => {
            warn!(default = DEFAULT_DATA_DIR, "paths.data_dir not set, using default");
            Ok(PathBuf::from(DEFAULT_DATA_DIR))
        }
    }
}
