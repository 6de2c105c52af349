use std::path::{Path, PathBuf};

/// Marker file whose presence requests an orderly shutdown.
#[derive(Debug, Clone)]
pub struct StopSentinel {
    path: PathBuf,
}

impl StopSentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
