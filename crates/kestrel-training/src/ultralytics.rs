//! Ultralytics YOLOv8 backend.
//!
//! Each call runs a short Python bridge in a fresh interpreter. The request
//! is written to the bridge's stdin as one JSON object; the bridge prints the
//! library's own output as usual and ends with a single line of the form
//! `__KESTREL_RESULT__ {"ok": true, ...}`. Everything else on stdout is
//! forwarded to the log at debug level; stderr is inherited.

use crate::artifacts::ExportFormat;
use crate::backend::{BackendTrainOutput, DetectionBackend, ModelSource};
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable naming the Python interpreter.
pub const PYTHON_ENV: &str = "KESTREL_PYTHON";
pub const DEFAULT_PYTHON: &str = "python3";

const RESULT_MARKER: &str = "__KESTREL_RESULT__";

const BRIDGE: &str = r#"
import json
import sys

MARKER = "__KESTREL_RESULT__"


def emit(payload):
    sys.stdout.flush()
    print(MARKER + " " + json.dumps(payload), flush=True)


def numbers(mapping):
    out = {}
    for key, value in dict(mapping or {}).items():
        try:
            out[str(key)] = float(value)
        except (TypeError, ValueError):
            pass
    return out


def run(request):
    from ultralytics import YOLO

    action = request["action"]
    if action == "train":
        model = YOLO(request["model"])
        results = model.train(**request["args"])
        trainer = getattr(model, "trainer", None)
        best = getattr(results, "best", None) or getattr(trainer, "best", None)
        save_dir = getattr(results, "save_dir", None) or getattr(trainer, "save_dir", None)
        metrics = numbers(getattr(results, "results_dict", None))
        if "epoch" not in metrics and trainer is not None and hasattr(trainer, "epoch"):
            metrics["epoch"] = float(trainer.epoch + 1)
        return {
            "best": str(best) if best else None,
            "save_dir": str(save_dir) if save_dir else None,
            "results": metrics,
        }
    if action == "val":
        model = YOLO(request["weights"])
        results = model.val(data=request["data"])
        return {"results": numbers(getattr(results, "results_dict", None))}
    if action == "export":
        model = YOLO(request["weights"])
        exported = model.export(format=request["format"], imgsz=request["imgsz"])
        return {"path": str(exported)}
    raise ValueError("unknown action: " + str(action))


def main():
    try:
        request = json.loads(sys.stdin.read())
        result = run(request)
        result["ok"] = True
        emit(result)
    except Exception as exc:
        emit({"ok": False, "error": type(exc).__name__ + ": " + str(exc)})
        sys.exit(1)


main()
"#;

/// Drives the Ultralytics library through a Python subprocess.
#[derive(Debug, Clone)]
pub struct UltralyticsBackend {
    python: String,
}

impl Default for UltralyticsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl UltralyticsBackend {
    /// Uses `$KESTREL_PYTHON`, falling back to `python3`.
    #[must_use]
    pub fn new() -> Self {
        let python = std::env::var(PYTHON_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string());
        Self::with_interpreter(python)
    }

    #[must_use]
    pub fn with_interpreter(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }

    #[must_use]
    pub fn interpreter(&self) -> &str {
        &self.python
    }

    async fn call(&self, request: Value) -> TrainingResult<Value> {
        let action = request["action"].as_str().unwrap_or("unknown").to_string();
        debug!(python = %self.python, action = %action, "starting ultralytics bridge");

        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(BRIDGE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TrainingError::RuntimeFailure(format!("failed to start {}: {e}", self.python))
            })?;

        let unavailable =
            |pipe: &str| TrainingError::RuntimeFailure(format!("bridge {pipe} not available"));
        let mut stdin = child.stdin.take().ok_or_else(|| unavailable("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| unavailable("stdout"))?;

        let payload = serde_json::to_vec(&request)?;
        stdin.write_all(&payload).await.map_err(|e| {
            TrainingError::RuntimeFailure(format!("failed to send request to bridge: {e}"))
        })?;
        drop(stdin);

        let mut lines = BufReader::new(stdout).lines();
        let mut result = None;
        while let Some(line) = lines.next_line().await? {
            match result_payload(&line) {
                Some(payload) => result = Some(payload.to_string()),
                None => debug!(target: "kestrel::ultralytics", "{line}"),
            }
        }

        let status = child.wait().await?;
        let Some(payload) = result else {
            return Err(TrainingError::RuntimeFailure(format!(
                "ultralytics bridge exited with {status} without a result"
            )));
        };
        decode_result(&payload)
    }
}

fn result_payload(line: &str) -> Option<&str> {
    line.strip_prefix(RESULT_MARKER).map(str::trim)
}

fn decode_result(payload: &str) -> TrainingResult<Value> {
    let value: Value = serde_json::from_str(payload)?;
    if value["ok"].as_bool() == Some(true) {
        return Ok(value);
    }
    let error = value["error"].as_str().unwrap_or("unknown error").to_string();
    Err(TrainingError::RuntimeFailure(error))
}

fn optional_path(value: &Value) -> Option<PathBuf> {
    value.as_str().filter(|s| !s.is_empty()).map(PathBuf::from)
}

#[async_trait]
impl DetectionBackend for UltralyticsBackend {
    fn id(&self) -> &'static str {
        "ultralytics"
    }

    fn check_available(&self) -> TrainingResult<()> {
        let output = std::process::Command::new(&self.python)
            .args(["-c", "import ultralytics"])
            .output();
        match output {
            Ok(output) if output.status.success() => {
                info!(python = %self.python, "ultralytics is available");
                Ok(())
            }
            Ok(_) => Err(TrainingError::DependencyMissing(format!(
                "the `ultralytics` package is not installed for {}; run `pip install ultralytics`",
                self.python
            ))),
            Err(e) => Err(TrainingError::DependencyMissing(format!(
                "python interpreter `{}` could not be started: {e}; set {PYTHON_ENV} to override",
                self.python
            ))),
        }
    }

    async fn train(
        &self,
        model: &ModelSource,
        args: &Map<String, Value>,
    ) -> TrainingResult<BackendTrainOutput> {
        let response = self
            .call(json!({ "action": "train", "model": model.as_argument(), "args": args }))
            .await?;
        Ok(BackendTrainOutput {
            best: optional_path(&response["best"]),
            save_dir: optional_path(&response["save_dir"]),
            results: response["results"].as_object().cloned().unwrap_or_default(),
        })
    }

    async fn validate(&self, weights: &Path, data: &Path) -> TrainingResult<Map<String, Value>> {
        let response = self
            .call(json!({
                "action": "val",
                "weights": weights.display().to_string(),
                "data": data.display().to_string(),
            }))
            .await?;
        Ok(response["results"].as_object().cloned().unwrap_or_default())
    }

    async fn export(
        &self,
        weights: &Path,
        format: ExportFormat,
        img_size: u32,
    ) -> TrainingResult<PathBuf> {
        let response = self
            .call(json!({
                "action": "export",
                "weights": weights.display().to_string(),
                "format": format.as_str(),
                "imgsz": img_size,
            }))
            .await?;
        optional_path(&response["path"])
            .ok_or_else(|| TrainingError::RuntimeFailure("export returned no path".to_string()))
    }
}
