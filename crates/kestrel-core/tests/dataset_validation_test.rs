//! End-to-end checks of the dataset validator against on-disk fixtures.

use kestrel_core::{DatasetValidation, DatasetValidator};
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

fn write_pairs(root: &Path, split: &str, stems: &[&str]) {
    let images = root.join("images").join(split);
    let labels = root.join("labels").join(split);
    std::fs::create_dir_all(&images).unwrap();
    std::fs::create_dir_all(&labels).unwrap();
    for stem in stems {
        std::fs::write(images.join(format!("{stem}.jpg")), b"jpg").unwrap();
        std::fs::write(labels.join(format!("{stem}.txt")), b"0 0.5 0.5 0.2 0.2\n").unwrap();
    }
}

fn complete_dataset() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("data.yaml"), MANIFEST).unwrap();
    for split in ["train", "val", "test"] {
        write_pairs(temp.path(), split, &["a", "b", "c", "d", "e"]);
    }
    temp
}

#[test]
fn test_complete_dataset_validates() {
    let temp = complete_dataset();

    let (ok, stats) = DatasetValidator::new().validate(temp.path());

    assert!(ok);
    assert_eq!(stats.train_images, 5);
    assert_eq!(stats.valid_images, 5);
    assert_eq!(stats.test_images, 5);
    assert_eq!(stats.classes, 2);
    assert_eq!(stats.class_names, vec!["sparrow", "finch"]);
    assert!(stats.error.is_none());
}

#[test]
fn test_image_without_label_fails_whole_dataset() {
    let temp = complete_dataset();
    std::fs::remove_file(temp.path().join("labels/train/c.txt")).unwrap();

    let validator = DatasetValidator::new();
    assert!(!validator.check_images_annotations(temp.path()));

    let comparison = validator
        .compare_split(temp.path(), kestrel_core::Split::Train)
        .unwrap();
    assert_eq!(comparison.missing_labels.iter().collect::<Vec<_>>(), vec!["c"]);
    assert!(comparison.missing_images.is_empty());

    let (ok, stats) = validator.validate(temp.path());
    assert!(!ok);
    assert!(stats.error.is_some());
}

#[test]
fn test_absent_test_split_is_tolerated() {
    let temp = complete_dataset();
    std::fs::remove_dir_all(temp.path().join("images/test")).unwrap();
    std::fs::remove_dir_all(temp.path().join("labels/test")).unwrap();

    let (ok, stats) = DatasetValidator::new().validate(temp.path());
    assert!(ok);
    assert_eq!(stats.test_images, 0);
}

#[test]
fn test_invalid_manifest_fails_before_file_checks() {
    let temp = complete_dataset();
    std::fs::write(temp.path().join("data.yaml"), "names: {}\n").unwrap();

    let (ok, stats) = DatasetValidator::new().validate(temp.path());
    assert!(!ok);
    assert!(stats.error.unwrap().contains("manifest"));
}
