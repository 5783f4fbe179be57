use std::path::Path;
use tracing::info;

/// Train, evaluate and export with an explicit or discovered `data.yaml`.
pub async fn execute(config_path: &Path, data_yaml: Option<&Path>) -> anyhow::Result<bool> {
    let mut pipeline = super::build_pipeline(config_path)?;
    let report = pipeline.run_training(data_yaml).await;
    super::log_report("training", &report)?;
    info!(success = report.success, "training run finished");
    Ok(report.success)
}
