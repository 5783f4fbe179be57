use anyhow::Context;
use kestrel_core::{DataDownloader, DatasetDownloader};
use std::path::Path;
use tracing::{error, info};

/// Download the dataset, check its structure and remove scratch directories.
///
/// Needs only the downloader; the training library does not have to be installed.
pub async fn execute(config_path: &Path, force: bool) -> anyhow::Result<bool> {
    let downloader =
        DatasetDownloader::from_config_file(config_path).context("failed to create downloader")?;

    let outcome = downloader.download(force).await;
    if !outcome.success {
        error!(message = %outcome.message, "download failed");
        return Ok(false);
    }
    info!(message = %outcome.message, "download complete");

    let (valid, report) = downloader.validate();
    super::log_report("download", &report)?;
    if !valid {
        error!("downloaded dataset failed validation");
        return Ok(false);
    }

    if !downloader.cleanup() {
        error!("failed to remove temporary data");
        return Ok(false);
    }
    Ok(true)
}
