//! Local-path-backed source: the directory is already current.

use std::path::{Path, PathBuf};

use agentbridge_shared::{BridgeError, Result, SourceOrigin};
use tracing::{debug, instrument};

use super::{SourceAdapter, SourceSnapshot, SyncOutcome, load_checkout};

/// A source read directly from a directory on disk.
///
/// Also the reverse reader for the canonical `agent` render target.
pub struct LocalAdapter {
    name: String,
    path: PathBuf,
    roots: Vec<String>,
}

impl LocalAdapter {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, roots: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            roots,
        }
    }
}

impl SourceAdapter for LocalAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Local(self.path.clone())
    }

    #[instrument(skip_all, fields(source = %self.name))]
    fn sync(&self) -> Result<SyncOutcome> {
        if !self.path.is_dir() {
            return Err(BridgeError::fetch(
                &self.name,
                format!("local path {} does not exist", self.path.display()),
            ));
        }
        debug!(path = %self.path.display(), "local source present");
        Ok(SyncOutcome::Current)
    }

    #[instrument(skip_all, fields(source = %self.name))]
    fn load(&self) -> Result<SourceSnapshot> {
        load_checkout(&self.name, &self.path, &self.roots)
    }

    fn checkout_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
