use std::path::PathBuf;

/// Filesystem layout of one training run.
///
/// The detection library writes each run under `<project>/<name>/`, with
/// checkpoints in `weights/best.pt` and `weights/last.pt`. Resuming starts
/// from `last.pt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    project: PathBuf,
    name: String,
}

impl RunLayout {
    #[must_use]
    pub fn new(project: PathBuf, name: impl Into<String>) -> Self {
        Self { project, name: name.into() }
    }

    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.project.join(&self.name)
    }

    #[must_use]
    pub fn weights_dir(&self) -> PathBuf {
        self.run_dir().join("weights")
    }

    #[must_use]
    pub fn best_weights(&self) -> PathBuf {
        self.weights_dir().join("best.pt")
    }

    #[must_use]
    pub fn last_weights(&self) -> PathBuf {
        self.weights_dir().join("last.pt")
    }

    /// Best checkpoint if a previous run left one behind.
    #[must_use]
    pub fn existing_best_weights(&self) -> Option<PathBuf> {
        Some(self.best_weights()).filter(|p| p.is_file())
    }
}
