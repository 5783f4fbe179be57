//! Roboflow REST client.
//!
//! A download is four requests: authenticate the key, resolve the project
//! version, ask for an export in the requested format, then fetch the zip
//! archive the export points at. The archive is unpacked into
//! `<destination>/<project>`.

use crate::dataset::host::{DatasetHost, DatasetRequest};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Public Roboflow API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.roboflow.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Client for the Roboflow dataset export API.
#[derive(Debug, Clone)]
pub struct RoboflowClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl RoboflowClient {
    /// Creates a client against the public API.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Creates a client against a custom endpoint.
    #[must_use]
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { api_key: api_key.into(), base_url, client }
    }

    async fn get_json(&self, url: &str) -> CoreResult<Value> {
        debug!(url = url, "roboflow request");
        let response = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| CoreError::Download(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Download(format!("{url} returned {status}: {body}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CoreError::Download(format!("invalid JSON from {url}: {e}")))
    }

    async fn authenticate(&self) -> CoreResult<()> {
        self.get_json(&format!("{}/", self.base_url)).await?;
        Ok(())
    }

    async fn resolve_version(&self, request: &DatasetRequest) -> CoreResult<()> {
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url, request.workspace, request.project, request.version
        );
        self.get_json(&url).await?;
        Ok(())
    }

    async fn export_link(&self, request: &DatasetRequest) -> CoreResult<String> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.base_url, request.workspace, request.project, request.version, request.format
        );
        let body = self.get_json(&url).await?;
        body.pointer("/export/link")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CoreError::Download(format!("export for {url} has no download link yet"))
            })
    }

    async fn download_archive(&self, link: &str) -> CoreResult<Vec<u8>> {
        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| CoreError::Download(format!("archive download failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Download(format!("archive download returned {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Download(format!("archive download interrupted: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DatasetHost for RoboflowClient {
    fn name(&self) -> &'static str {
        "roboflow"
    }

    async fn fetch(&self, request: &DatasetRequest, destination: &Path) -> CoreResult<PathBuf> {
        self.authenticate().await?;
        self.resolve_version(request).await?;
        let link = self.export_link(request).await?;
        let archive = self.download_archive(&link).await?;
        info!(
            project = %request.project,
            version = %request.version,
            bytes = archive.len(),
            "dataset archive downloaded"
        );

        let target = destination.join(&request.project);
        let unpack_into = target.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &unpack_into))
            .await
            .map_err(|e| CoreError::Download(format!("archive extraction aborted: {e}")))??;

        Ok(target)
    }
}

/// Unpack a zip archive into `target`, replacing whatever was there.
///
/// The archive is extracted into a `<name>.tmp-<pid>` sibling first; `target`
/// is only replaced once extraction succeeded.
fn extract_archive(bytes: &[u8], target: &Path) -> CoreResult<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CoreError::Download(format!("invalid dataset archive: {e}")))?;

    let staging = sibling(target, "tmp")?;
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    if let Err(e) = archive.extract(&staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(CoreError::Download(format!("failed to extract dataset archive: {e}")));
    }

    if !target.exists() {
        std::fs::rename(&staging, target)?;
        return Ok(());
    }

    let previous = sibling(target, "tmp-old")?;
    if previous.exists() {
        std::fs::remove_dir_all(&previous)?;
    }
    std::fs::rename(target, &previous)?;
    if let Err(e) = std::fs::rename(&staging, target) {
        std::fs::rename(&previous, target)?;
        return Err(e.into());
    }
    std::fs::remove_dir_all(&previous)?;
    Ok(())
}

fn sibling(target: &Path, marker: &str) -> CoreResult<PathBuf> {
    let name = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            CoreError::Download(format!("invalid extraction target: {}", target.display()))
        })?;
    Ok(target.with_file_name(format!("{name}.{marker}-{}", std::process::id())))
}
