//! Transactional artifact writer and per-target manifests.
//!
//! A render is staged as temp siblings first. If any staging write fails,
//! the temps (and any directories created for them) are removed and the
//! previous output is left untouched. Only then are temps renamed into
//! place, with replaced files moved aside until every rename succeeded; a
//! failed rename restores them. Files from the previous manifest that are no
//! longer produced are then deleted, and the new manifest is written.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use agentbridge_shared::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::converter::Artifact;

/// Directory (under the destination root) holding render manifests.
pub const MANIFEST_DIR: &str = ".agent-bridge/manifests";

const TEMP_SUFFIX: &str = ".agent-bridge.tmp";
const BACKUP_SUFFIX: &str = ".agent-bridge.bak";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Record of what one target rendered under a destination root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub target: String,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative path with `/` separators.
    pub path: String,
    pub sha256: String,
}

/// Outcome of a successful render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Every file the target now owns, sorted.
    pub files: Vec<PathBuf>,
    /// Files whose bytes changed (or were created).
    pub written: Vec<PathBuf>,
    /// Files from the previous render no longer produced.
    pub removed: Vec<PathBuf>,
}

pub fn manifest_path(dest: &Path, target: &str) -> PathBuf {
    dest.join(MANIFEST_DIR).join(format!("{target}.json"))
}

/// Read a target's manifest. `None` if the target never rendered here.
pub fn read_manifest(dest: &Path, target: &str) -> Result<Option<Manifest>> {
    let path = manifest_path(dest, target);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| BridgeError::io(&path, e))?;
    let manifest = serde_json::from_str(&content).map_err(|e| {
        BridgeError::render(target, format!("corrupt manifest {}: {e}", path.display()))
    })?;
    Ok(Some(manifest))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject absolute paths, `..`, and anything inside the manifest directory.
fn check_relative(target: &str, path: &Path) -> Result<()> {
    let escapes = path.as_os_str().is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(BridgeError::render(
            target,
            format!("artifact path {} is not a plain relative path", path.display()),
        ));
    }
    if path.starts_with(MANIFEST_DIR) {
        return Err(BridgeError::render(
            target,
            format!("artifact path {} collides with manifests", path.display()),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

struct Staged {
    temp: PathBuf,
    target: PathBuf,
}

/// Write artifacts under `dest` as one unit of work.
#[instrument(skip_all, fields(target_name = target, dest = %dest.display(), artifacts = artifacts.len()))]
pub fn write_artifacts(
    target: &str,
    dest: &Path,
    mut artifacts: Vec<Artifact>,
) -> Result<RenderSummary> {
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));

    let mut seen = BTreeSet::new();
    for artifact in &artifacts {
        check_relative(target, &artifact.path)?;
        if !seen.insert(artifact.path.clone()) {
            return Err(BridgeError::render(
                target,
                format!("converter produced {} twice", artifact.path.display()),
            ));
        }
    }

    let previous = read_manifest(dest, target)?;

    // --- Stage ---
    let mut staged: Vec<Staged> = Vec::new();
    let mut created_dirs: Vec<PathBuf> = Vec::new();
    let mut summary = RenderSummary::default();

    for artifact in &artifacts {
        let abs = dest.join(&artifact.path);
        summary.files.push(artifact.path.clone());

        if std::fs::read(&abs).is_ok_and(|existing| existing == artifact.bytes) {
            debug!(path = %artifact.path.display(), "unchanged");
            continue;
        }

        if let Err(e) = stage_one(&abs, &artifact.bytes, &mut created_dirs, &mut staged) {
            rollback(&staged, &created_dirs);
            warn!(path = %abs.display(), error = %e, "staging failed, rolled back");
            return Err(BridgeError::render(target, format!("{}: {e}", abs.display())));
        }
        summary.written.push(artifact.path.clone());
    }

    // --- Commit ---
    if let Err((path, e)) = commit(&staged) {
        rollback(&staged, &created_dirs);
        warn!(path = %path.display(), error = %e, "commit failed, restored previous output");
        return Err(BridgeError::render(target, format!("{}: {e}", path.display())));
    }

    // --- Stale cleanup ---
    if let Some(previous) = previous {
        let current: BTreeSet<String> = artifacts.iter().map(|a| slash(&a.path)).collect();
        for entry in previous.files {
            if current.contains(&entry.path) {
                continue;
            }
            let rel = PathBuf::from(&entry.path);
            if check_relative(target, &rel).is_err() {
                continue;
            }
            let abs = dest.join(&rel);
            match std::fs::remove_file(&abs) {
                Ok(()) => {
                    prune_empty_parents(&abs, dest);
                    summary.removed.push(rel);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(BridgeError::render(target, format!("{}: {e}", abs.display()))),
            }
        }
    }

    // --- Manifest ---
    let manifest = Manifest {
        target: target.to_string(),
        files: artifacts
            .iter()
            .map(|a| ManifestEntry {
                path: slash(&a.path),
                sha256: sha256_hex(&a.bytes),
            })
            .collect(),
    };
    write_manifest(dest, &manifest)?;

    info!(
        files = summary.files.len(),
        written = summary.written.len(),
        removed = summary.removed.len(),
        "rendered target"
    );
    Ok(summary)
}

fn stage_one(
    abs: &Path,
    bytes: &[u8],
    created_dirs: &mut Vec<PathBuf>,
    staged: &mut Vec<Staged>,
) -> std::io::Result<()> {
    if let Some(parent) = abs.parent() {
        let mut missing: Vec<PathBuf> = parent
            .ancestors()
            .take_while(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect();
        missing.reverse();
        created_dirs.extend(missing);
        std::fs::create_dir_all(parent)?;
    }

    let file_name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = abs.with_file_name(format!(".{file_name}{TEMP_SUFFIX}"));
    std::fs::write(&temp, bytes)?;
    staged.push(Staged {
        temp,
        target: abs.to_path_buf(),
    });
    Ok(())
}

/// A file moved aside during commit, restorable until the commit completes.
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

fn backup_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}{BACKUP_SUFFIX}"))
}

/// Rename every temp into place. Replaced files are moved aside first; on
/// the first failure every completed rename is undone and the backups are
/// restored, so the destination holds exactly what it held before.
fn commit(staged: &[Staged]) -> std::result::Result<(), (PathBuf, std::io::Error)> {
    let mut done: Vec<Committed> = Vec::with_capacity(staged.len());
    let mut failure = None;

    for s in staged {
        let backup = if s.target.is_file() {
            let backup = backup_path(&s.target);
            if let Err(e) = std::fs::rename(&s.target, &backup) {
                failure = Some((s.target.clone(), e));
                break;
            }
            Some(backup)
        } else {
            None
        };
        if let Err(e) = std::fs::rename(&s.temp, &s.target) {
            if let Some(backup) = &backup {
                let _ = std::fs::rename(backup, &s.target);
            }
            failure = Some((s.target.clone(), e));
            break;
        }
        done.push(Committed {
            target: s.target.clone(),
            backup,
        });
    }

    match failure {
        None => {
            for c in &done {
                if let Some(backup) = &c.backup {
                    let _ = std::fs::remove_file(backup);
                }
            }
            Ok(())
        }
        Some(err) => {
            for c in done.iter().rev() {
                match &c.backup {
                    Some(backup) => {
                        let _ = std::fs::rename(backup, &c.target);
                    }
                    None => {
                        let _ = std::fs::remove_file(&c.target);
                    }
                }
            }
            Err(err)
        }
    }
}

fn rollback(staged: &[Staged], created_dirs: &[PathBuf]) {
    for s in staged {
        let _ = std::fs::remove_file(&s.temp);
    }
    for dir in created_dirs.iter().rev() {
        let _ = std::fs::remove_dir(dir);
    }
}

fn write_manifest(dest: &Path, manifest: &Manifest) -> Result<()> {
    let path = manifest_path(dest, &manifest.target);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BridgeError::io(parent, e))?;
    }
    let mut json = serde_json::to_string_pretty(manifest)
        .map_err(|e| BridgeError::validation(format!("JSON serialization failed: {e}")))?;
    json.push('\n');

    let temp = path.with_file_name(format!(".{}.json{TEMP_SUFFIX}", manifest.target));
    std::fs::write(&temp, json).map_err(|e| BridgeError::io(&temp, e))?;
    std::fs::rename(&temp, &path).map_err(|e| BridgeError::io(&path, e))?;
    Ok(())
}

/// Remove now-empty directories between `file` and `root` (exclusive).
fn prune_empty_parents(file: &Path, root: &Path) {
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

/// Delete every file listed in the target's manifest, then the manifest.
#[instrument(skip_all, fields(target_name = target, dest = %dest.display()))]
pub fn remove_artifacts(target: &str, dest: &Path) -> Result<Vec<PathBuf>> {
    let Some(manifest) = read_manifest(dest, target)? else {
        debug!("no manifest, nothing to remove");
        return Ok(Vec::new());
    };

    let mut removed = Vec::new();
    for entry in &manifest.files {
        let rel = PathBuf::from(&entry.path);
        if check_relative(target, &rel).is_err() {
            warn!(path = %entry.path, "ignoring manifest entry outside destination");
            continue;
        }
        let abs = dest.join(&rel);
        match std::fs::remove_file(&abs) {
            Ok(()) => {
                prune_empty_parents(&abs, dest);
                removed.push(rel);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BridgeError::render(target, format!("{}: {e}", abs.display()))),
        }
    }

    let path = manifest_path(dest, target);
    std::fs::remove_file(&path).map_err(|e| BridgeError::io(&path, e))?;
    prune_empty_parents(&path, dest);

    info!(removed = removed.len(), "removed target output");
    Ok(removed)
}
