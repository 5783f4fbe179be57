//! Structural validation of a YOLO-layout dataset root.
//!
//! Expected layout:
//!
//! ```text
//! <root>/data.yaml
//! <root>/images/<split>/*.{jpg,png}
//! <root>/labels/<split>/*.txt
//! ```
//!
//! A split whose images or labels directory is absent is skipped. Any present
//! split whose image base names differ from its label base names fails the
//! whole dataset, and checking stops at that split.

use crate::dataset::manifest::{self, MANIFEST_FILE};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];
const LABEL_EXTENSIONS: [&str; 1] = ["txt"];

/// One dataset partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Self; 3] = [Self::Train, Self::Val, Self::Test];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }

    /// Directory names accepted on disk, in preference order.
    #[must_use]
    pub fn dir_names(self) -> &'static [&'static str] {
        match self {
            Self::Train => &["train"],
            Self::Val => &["val", "valid"],
            Self::Test => &["test"],
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base-name difference between a split's images and labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitComparison {
    pub split: Split,
    /// Images with no matching label file.
    pub missing_labels: BTreeSet<String>,
    /// Label files with no matching image.
    pub missing_images: BTreeSet<String>,
}

impl SplitComparison {
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.missing_labels.is_empty() && self.missing_images.is_empty()
    }
}

/// Summary produced by [`DatasetValidation::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub path: PathBuf,
    pub train_images: usize,
    pub valid_images: usize,
    pub test_images: usize,
    pub classes: usize,
    pub class_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatasetStats {
    fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self { path: path.to_path_buf(), error: Some(error.into()), ..Self::default() }
    }
}

/// Validation operations over a dataset root.
pub trait DatasetValidation {
    /// Validate manifest and image/label pairing, returning counts on success.
    fn validate(&self, root: &Path) -> (bool, DatasetStats);

    /// Check the manifest schema.
    fn check_yaml(&self, manifest_path: &Path) -> bool;

    /// Check image/label base-name equality for every present split.
    fn check_images_annotations(&self, root: &Path) -> bool;
}

/// Validator for YOLO-layout datasets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetValidator;

impl DatasetValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compare one split. `None` if the split has no images or labels directory.
    #[must_use]
    pub fn compare_split(&self, root: &Path, split: Split) -> Option<SplitComparison> {
        let (images_dir, labels_dir) = split_dirs(root, split)?;

        let images = base_names(&images_dir, &IMAGE_EXTENSIONS);
        let labels = base_names(&labels_dir, &LABEL_EXTENSIONS);

        Some(SplitComparison {
            split,
            missing_labels: images.difference(&labels).cloned().collect(),
            missing_images: labels.difference(&images).cloned().collect(),
        })
    }

    fn collect_stats(&self, root: &Path, manifest_path: &Path) -> DatasetStats {
        let count = |split: Split| {
            split_dirs(root, split)
                .map(|(images, _)| images)
                .or_else(|| {
                    split
                        .dir_names()
                        .iter()
                        .map(|name| root.join("images").join(name))
                        .find(|dir| dir.is_dir())
                })
                .map_or(0, |dir| count_images(&dir))
        };

        let class_names = match manifest::read_manifest(manifest_path) {
            Ok(manifest) => manifest::class_names(&manifest),
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "could not read class names");
                Vec::new()
            }
        };

        DatasetStats {
            path: root.to_path_buf(),
            train_images: count(Split::Train),
            valid_images: count(Split::Val),
            test_images: count(Split::Test),
            classes: class_names.len(),
            class_names,
            error: None,
        }
    }
}

impl DatasetValidation for DatasetValidator {
    fn validate(&self, root: &Path) -> (bool, DatasetStats) {
        if !root.is_dir() {
            error!(path = %root.display(), "dataset directory not found");
            let message = format!("dataset directory not found: {}", root.display());
            return (false, DatasetStats::failed(root, message));
        }

        let manifest_path = root.join(MANIFEST_FILE);
        if !self.check_yaml(&manifest_path) {
            let message = format!("invalid manifest: {}", manifest_path.display());
            return (false, DatasetStats::failed(root, message));
        }

        if !self.check_images_annotations(root) {
            return (false, DatasetStats::failed(root, "images and annotations do not match"));
        }

        let stats = self.collect_stats(root, &manifest_path);
        info!(
            path = %root.display(),
            train = stats.train_images,
            valid = stats.valid_images,
            test = stats.test_images,
            classes = stats.classes,
            "dataset validated"
        );
        (true, stats)
    }

    fn check_yaml(&self, manifest_path: &Path) -> bool {
        manifest::check_manifest(manifest_path)
    }

    fn check_images_annotations(&self, root: &Path) -> bool {
        for split in Split::ALL {
            let Some(comparison) = self.compare_split(root, split) else {
                warn!(split = %split, "split directories not found, skipping");
                continue;
            };

            if comparison.is_match() {
                continue;
            }

            if !comparison.missing_labels.is_empty() {
                error!(
                    split = %split,
                    count = comparison.missing_labels.len(),
                    names = ?comparison.missing_labels,
                    "images without annotations"
                );
            }
            if !comparison.missing_images.is_empty() {
                error!(
                    split = %split,
                    count = comparison.missing_images.len(),
                    names = ?comparison.missing_images,
                    "annotations without images"
                );
            }
            return false;
        }

        info!(path = %root.display(), "images and annotations match");
        true
    }
}

/// First `images/<name>` and `labels/<name>` pair of a split where both exist.
fn split_dirs(root: &Path, split: Split) -> Option<(PathBuf, PathBuf)> {
    split.dir_names().iter().find_map(|name| {
        let images = root.join("images").join(name);
        let labels = root.join("labels").join(name);
        (images.is_dir() && labels.is_dir()).then_some((images, labels))
    })
}

/// Regular files in `dir` whose extension is one of `extensions`.
pub(crate) fn matching_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to list directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .collect()
}

/// Number of `.jpg`/`.png` files directly inside `dir`.
pub(crate) fn count_images(dir: &Path) -> usize {
    matching_files(dir, &IMAGE_EXTENSIONS).len()
}

/// Extension-stripped names of the matching files in `dir`.
fn base_names(dir: &Path, extensions: &[&str]) -> BTreeSet<String> {
    matching_files(dir, extensions)
        .iter()
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string))
        .collect()
}
