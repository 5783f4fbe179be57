//! Integration tests for the `kestrel` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = "\
path: .
train: images/train
val: images/val
test: images/test
names:
  0: sparrow
  1: finch
";

const SETTINGS: &str = r#"
roboflow:
  api_key: ${KESTREL_TEST_API_KEY:offline-key}
  workspace: ws
  project: birds
  version: "1"
  format: yolov8
paths:
  processed_data_dir: data
  data_dir: dataset
  model_save_dir: models
training:
  model_size: nano
  epochs: 1
"#;

fn kestrel(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kestrel").unwrap();
    cmd.current_dir(temp.path())
        .env("LOG_CFG", temp.path().join("no-logging.yml"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_dataset(root: &Path, stems: &[&str]) {
    std::fs::create_dir_all(root).unwrap();
    std::fs::write(root.join("data.yaml"), MANIFEST).unwrap();
    for split in ["train", "val", "test"] {
        let images = root.join("images").join(split);
        let labels = root.join("labels").join(split);
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();
        for stem in stems {
            std::fs::write(images.join(format!("{stem}.png")), b"png").unwrap();
            std::fs::write(labels.join(format!("{stem}.txt")), b"1 0.5 0.5 0.3 0.3\n").unwrap();
        }
    }
}

fn log_contents(temp: &TempDir) -> String {
    std::fs::read_to_string(temp.path().join("logs/kestrel.log")).unwrap_or_default()
}

#[test]
fn test_mode_is_required() {
    let temp = TempDir::new().unwrap();
    kestrel(&temp).assert().failure().stderr(predicate::str::contains("--mode"));
}

#[test]
fn test_unknown_mode_is_rejected() {
    let temp = TempDir::new().unwrap();
    kestrel(&temp).args(["--mode", "predict"]).assert().failure();
}

#[test]
fn test_download_with_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    kestrel(&temp)
        .args(["--mode", "download", "--config", "config/absent.yml"])
        .assert()
        .code(1);
    assert!(log_contents(&temp).contains("not found"));
}

#[test]
fn test_validate_good_dataset() {
    let temp = TempDir::new().unwrap();
    write_dataset(&temp.path().join("birds"), &["a", "b", "c"]);

    kestrel(&temp)
        .args(["--mode", "validate", "--dataset", "birds"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let log = log_contents(&temp);
    assert!(log.contains("dataset validated"));
    assert!(log.contains("\"train_images\":3"));
}

#[test]
fn test_validate_mismatched_dataset_fails() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("birds");
    write_dataset(&root, &["a", "b"]);
    std::fs::write(root.join("images/val/orphan.jpg"), b"jpg").unwrap();

    kestrel(&temp)
        .args(["--mode", "validate", "--dataset", "birds"])
        .assert()
        .code(1);
    assert!(log_contents(&temp).contains("orphan"));
}

#[test]
fn test_validate_uses_configured_data_dir() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("config")).unwrap();
    std::fs::write(temp.path().join("config/settings.yml"), SETTINGS).unwrap();
    write_dataset(&temp.path().join("dataset"), &["a"]);

    kestrel(&temp).args(["--mode", "validate"]).assert().success();
}

#[test]
fn test_train_without_roboflow_settings_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("settings.yml"), "training:\n  epochs: 1\n").unwrap();

    kestrel(&temp)
        .args(["--mode", "train", "--config", "settings.yml"])
        .assert()
        .code(1);
    assert!(log_contents(&temp).contains("incomplete configuration"));
}

#[test]
fn test_all_without_training_library_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("settings.yml"), SETTINGS).unwrap();

    kestrel(&temp)
        .env("KESTREL_PYTHON", "kestrel-no-such-python")
        .args(["--mode", "all", "--config", "settings.yml"])
        .assert()
        .code(1);

    assert!(temp.path().join("data").is_dir());
    assert!(log_contents(&temp).contains("missing dependency"));
}

#[test]
fn test_logging_settings_file_is_honoured() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("logging.yml"),
        "level: debug\ndir: ${KESTREL_TEST_LOG_DIR:custom_logs}\nfile: run.log\nformat: json\n",
    )
    .unwrap();
    write_dataset(&temp.path().join("birds"), &["a"]);

    kestrel(&temp)
        .env("LOG_CFG", temp.path().join("logging.yml"))
        .env_remove("KESTREL_TEST_LOG_DIR")
        .args(["--mode", "validate", "--dataset", "birds"])
        .assert()
        .success();

    let log = std::fs::read_to_string(temp.path().join("custom_logs/run.log")).unwrap();
    let first = log.lines().next().unwrap();
    let event: serde_json::Value = serde_json::from_str(first).unwrap();
    assert!(event.get("level").is_some());
    assert!(!temp.path().join("logs/kestrel.log").exists());
}
