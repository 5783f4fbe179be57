mod common;

use common::{training_config, FakeBackend, MANIFEST};
use kestrel_training::{ModelSource, Trainer, TrainerState, TrainingError, YoloTrainer};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn manifest(temp: &TempDir) -> PathBuf {
    let project = temp.path().join("data/birds");
    std::fs::create_dir_all(&project).unwrap();
    let path = project.join("data.yaml");
    std::fs::write(&path, MANIFEST).unwrap();
    path
}

fn trainer(temp: &TempDir, backend: &Arc<FakeBackend>) -> YoloTrainer {
    YoloTrainer::new(training_config(temp.path()), backend.clone()).unwrap()
}

#[test]
fn test_unavailable_backend_is_dependency_missing() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend { unavailable: true, ..FakeBackend::default() });

    let err = YoloTrainer::new(training_config(temp.path()), backend).unwrap_err();
    assert!(matches!(err, TrainingError::DependencyMissing(_)));
}

#[tokio::test]
async fn test_train_without_manifest_is_config_error() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);

    let err = trainer.train(None, false).await.unwrap_err();
    assert!(matches!(err, TrainingError::Config(_)));
    assert_eq!(trainer.state(), TrainerState::Uninitialized);
    assert!(backend.last_model().is_none());
}

#[tokio::test]
async fn test_train_with_missing_manifest_is_not_found() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);

    let err = trainer.train(Some(&temp.path().join("nope.yaml")), false).await.unwrap_err();
    assert!(matches!(err, TrainingError::NotFound(_)));
}

#[tokio::test]
async fn test_train_records_weights_and_metrics() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    let data = manifest(&temp);

    let metrics = trainer.train(Some(&data), false).await.unwrap();

    assert!(metrics.success);
    assert!((metrics.map50 - 0.88).abs() < 1e-9);
    assert!(metrics.val_loss.abs() < f64::EPSILON);
    assert_eq!(metrics.epochs_completed, 3);
    let best = temp.path().join("models/yolov8_nano_640px/weights/best.pt");
    assert_eq!(metrics.model_path.as_deref(), Some(best.as_path()));
    assert_eq!(trainer.state(), TrainerState::Trained);

    assert_eq!(backend.last_model(), Some(ModelSource::Pretrained("yolov8n.pt".to_string())));
    let args = backend.last_args();
    assert_eq!(args["data"], data.display().to_string());
    assert_eq!(args["name"], "yolov8_nano_640px");
    assert!(!args.contains_key("resume"));
}

#[tokio::test]
async fn test_retrain_starts_from_best_weights() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    let data = manifest(&temp);

    trainer.train(Some(&data), false).await.unwrap();
    trainer.train(None, false).await.unwrap();

    let best = temp.path().join("models/yolov8_nano_640px/weights/best.pt");
    assert_eq!(backend.last_model(), Some(ModelSource::Weights(best)));
    assert!(!backend.last_args().contains_key("resume"));
}

#[tokio::test]
async fn test_resume_starts_from_last_checkpoint() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    let data = manifest(&temp);

    trainer.train(Some(&data), false).await.unwrap();
    trainer.train(None, true).await.unwrap();

    let last = temp.path().join("models/yolov8_nano_640px/weights/last.pt");
    assert_eq!(backend.last_model(), Some(ModelSource::Weights(last)));
    assert_eq!(backend.last_args()["resume"], true);
}

#[tokio::test]
async fn test_resume_without_previous_run_starts_pretrained() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);

    trainer.train(Some(&manifest(&temp)), true).await.unwrap();

    assert_eq!(backend.last_model(), Some(ModelSource::Pretrained("yolov8n.pt".to_string())));
    assert!(!backend.last_args().contains_key("resume"));
}

#[tokio::test]
async fn test_library_error_becomes_training_failure() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend {
        train_error: Some("CUDA out of memory".to_string()),
        ..FakeBackend::default()
    });
    let mut trainer = trainer(&temp, &backend);
    let data = manifest(&temp);

    let err = trainer.train(Some(&data), false).await.unwrap_err();
    assert!(matches!(
        &err,
        TrainingError::TrainingFailure(msg) if msg.contains("CUDA out of memory")
    ));
}

#[tokio::test]
async fn test_validate_requires_trained_weights() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);

    assert!(matches!(trainer.validate().await, Err(TrainingError::NotFound(_))));
    assert!(matches!(trainer.export("onnx", None).await, Err(TrainingError::NotFound(_))));
}

#[tokio::test]
async fn test_validate_after_training() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    trainer.train(Some(&manifest(&temp)), false).await.unwrap();

    let metrics = trainer.validate().await.unwrap();
    assert!((metrics.map50 - 0.87).abs() < 1e-9);
    assert!(metrics.recall.abs() < f64::EPSILON);
    assert_eq!(trainer.state(), TrainerState::Validated);
}

#[tokio::test]
async fn test_export_rejects_unknown_format() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    trainer.train(Some(&manifest(&temp)), false).await.unwrap();

    let err = trainer.export("gguf", None).await.unwrap_err();
    assert!(matches!(err, TrainingError::UnsupportedFormat(_)));
    assert_eq!(trainer.state(), TrainerState::Trained);
}

#[tokio::test]
async fn test_export_next_to_weights() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    trainer.train(Some(&manifest(&temp)), false).await.unwrap();

    let record = trainer.export("ONNX", None).await.unwrap();

    assert!(record.success);
    assert_eq!(
        record.exported_path,
        temp.path().join("models/yolov8_nano_640px/weights/best.onnx")
    );
    assert!((record.model_size_mb - 3.0).abs() < f64::EPSILON);
    assert!(record.sha256.is_some());
    assert_eq!(trainer.state(), TrainerState::Exported);
}

#[tokio::test]
async fn test_export_copies_into_output_dir() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let mut trainer = trainer(&temp, &backend);
    trainer.train(Some(&manifest(&temp)), false).await.unwrap();
    let out = temp.path().join("deploy/models");

    let record = trainer.export("onnx", Some(&out)).await.unwrap();
    assert_eq!(record.exported_path, out.join("best.onnx"));
    assert!(out.join("best.onnx").is_file());

    let record = trainer.export("openvino", Some(&out)).await.unwrap();
    assert_eq!(record.exported_path, out.join("best_openvino_model"));
    assert!(out.join("best_openvino_model/model.bin").is_file());
    assert!(record.sha256.is_none());
}

#[tokio::test]
async fn test_export_under_another_spelling_is_not_copied_onto_itself() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend { alias_exports: true, ..FakeBackend::default() });
    let mut trainer = trainer(&temp, &backend);
    trainer.train(Some(&manifest(&temp)), false).await.unwrap();
    let weights = temp.path().join("models/yolov8_nano_640px/weights");

    let record = trainer.export("onnx", None).await.unwrap();
    assert!((record.model_size_mb - 3.0).abs() < f64::EPSILON);

    let record = trainer.export("onnx", Some(&weights)).await.unwrap();
    assert_eq!(
        std::fs::canonicalize(&record.exported_path).unwrap(),
        std::fs::canonicalize(weights.join("best.onnx")).unwrap()
    );
    assert!((record.model_size_mb - 3.0).abs() < f64::EPSILON);
    assert_eq!(std::fs::metadata(weights.join("best.onnx")).unwrap().len(), 3 * 1024 * 1024);
}

#[tokio::test]
async fn test_export_failure_is_runtime_failure() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend {
        export_error: Some("onnx not installed".to_string()),
        ..FakeBackend::default()
    });
    let mut trainer = trainer(&temp, &backend);
    trainer.train(Some(&manifest(&temp)), false).await.unwrap();

    let err = trainer.export("onnx", None).await.unwrap_err();
    assert!(matches!(
        &err,
        TrainingError::RuntimeFailure(msg) if msg.contains("onnx not installed")
    ));
}
