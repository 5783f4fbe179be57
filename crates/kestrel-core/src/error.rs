//! Error types for configuration and dataset operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the configuration and dataset layers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A file or directory that must exist is missing.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A YAML document could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Required settings are absent or have the wrong type.
    #[error("incomplete configuration: {0}")]
    ConfigIncomplete(String),

    /// A required external client is not available in this build or environment.
    #[error("missing dependency: {0}")]
    DependencyMissing(String),

    /// A directory cannot be created or written to.
    #[error("permission denied for {}: {reason}", path.display())]
    PermissionDenied { path: PathBuf, reason: String },

    /// A value violates a schema constraint.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The hosting API rejected a request or returned something unusable.
    #[error("download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
