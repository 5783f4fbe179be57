use std::path::Path;

/// Run the full download-to-deploy pipeline.
pub async fn execute(config_path: &Path, force: bool) -> anyhow::Result<bool> {
    let mut pipeline = super::build_pipeline(config_path)?;
    let report = pipeline.run_full_pipeline(force).await;
    super::log_report("pipeline", &report)?;
    Ok(report.success)
}
