//! The dataset manifest (`data.yaml`).

use crate::error::{CoreError, CoreResult};
use serde_yaml::Value;
use std::path::Path;
use tracing::{error, info};

/// File name of the manifest inside a dataset root.
pub const MANIFEST_FILE: &str = "data.yaml";

/// Keys every manifest must declare.
pub const REQUIRED_KEYS: [&str; 5] = ["path", "train", "val", "test", "names"];

/// Read and parse a manifest without checking its shape.
pub fn read_manifest(path: &Path) -> CoreResult<Value> {
    if !path.exists() {
        return Err(CoreError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|source| CoreError::Parse { path: path.to_path_buf(), source })
}

/// Check that a manifest exists, parses, declares every required key and has
/// a non-empty `names` mapping.
#[must_use]
pub fn check_manifest(path: &Path) -> bool {
    let manifest = match read_manifest(path) {
        Ok(manifest) => manifest,
        Err(CoreError::NotFound(_)) => {
            error!(path = %path.display(), "manifest not found");
            return false;
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read manifest");
            return false;
        }
    };

    if let Some(missing) = REQUIRED_KEYS.iter().find(|key| manifest.get(**key).is_none()) {
        error!(path = %path.display(), key = *missing, "manifest is missing a required key");
        return false;
    }

    match &manifest["names"] {
        Value::Mapping(names) if !names.is_empty() => {
            info!(path = %path.display(), classes = names.len(), "manifest is valid");
            true
        }
        _ => {
            error!(path = %path.display(), "manifest declares no classes");
            false
        }
    }
}

/// Class names in declaration order.
///
/// Accepts both `names: [a, b]` and `names: {0: a, 1: b}`; anything else
/// yields an empty list.
#[must_use]
pub fn class_names(manifest: &Value) -> Vec<String> {
    match manifest.get("names") {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(Value::Mapping(map)) => map.values().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
