//! The converter contract.

use std::path::{Path, PathBuf};

use agentbridge_shared::{MergedKnowledgeTree, Result};
use serde::Serialize;

use crate::writer::{self, RenderSummary};

/// Maturity of a target's output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Stable,
    Beta,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Beta => f.write_str("beta"),
        }
    }
}

/// Static description of a render target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetInfo {
    /// Registry identifier (lowercase).
    pub name: &'static str,
    pub display_name: &'static str,
    /// Main output directory, relative to the destination root.
    pub output_dir: &'static str,
    pub status: TargetStatus,
}

/// One output file: a path relative to the destination root plus its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bytes: text.into().into_bytes(),
        }
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn json<T: Serialize>(path: impl Into<PathBuf>, value: &T) -> Result<Self> {
        let path = path.into();
        let mut text = serde_json::to_string_pretty(value).map_err(|e| {
            agentbridge_shared::BridgeError::validation(format!(
                "JSON serialization failed for {}: {e}",
                path.display()
            ))
        })?;
        text.push('\n');
        Ok(Self::text(path, text))
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Maps the merged tree onto one target's on-disk schema.
///
/// `convert` is pure: the same tree always yields the same artifacts in the
/// same order. Writing, stale cleanup and removal are shared and go through
/// the per-target manifest.
pub trait Converter: Send + Sync {
    fn info(&self) -> &TargetInfo;

    /// Produce every artifact for this target.
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>>;

    /// Convert and write under `dest`, all or nothing.
    fn render(&self, tree: &MergedKnowledgeTree, dest: &Path) -> Result<RenderSummary> {
        let artifacts = self.convert(tree)?;
        writer::write_artifacts(self.info().name, dest, artifacts)
    }

    /// Delete everything a previous render wrote under `dest`.
    fn remove(&self, dest: &Path) -> Result<Vec<PathBuf>> {
        writer::remove_artifacts(self.info().name, dest)
    }
}
