//! Pipeline operations: sync sources, build the merged tree, render and
//! remove targets.
//!
//! Source and target failures are isolated: a source that cannot be synced
//! or loaded is dropped with a warning, and a target that cannot be rendered
//! fails alone while the others complete.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentbridge_converters::registry;
use agentbridge_shared::{
    AppConfig, BUILTIN_SOURCE_NAME, BridgeError, BridgeHome, KnowledgeTree, MergedKnowledgeTree,
    Result, SourceRecord, Warning, WarningKind,
};
use agentbridge_sources::{BuiltinAdapter, SourceAdapter, SyncOutcome, adapter_for, load_root};
use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::merge::{self, PROJECT_SOURCE_NAME, SourceLayers};
use crate::report::{RunReport, SourceOutcome, SourceStatus, TargetOutcome, TargetResult};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when one source finished syncing.
    fn source_synced(&self, name: &str, current: usize, total: usize);
    /// Called when one target finished rendering or removal.
    fn target_done(&self, target: &str, current: usize, total: usize);
    /// Called when the operation completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_synced(&self, _name: &str, _current: usize, _total: usize) {}
    fn target_done(&self, _target: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Sync registered sources with at most `concurrency` running at once.
///
/// `names` selects sources; empty means every enabled source. Failures are
/// recorded as warnings. Successful syncs stamp `last_synced` in `config`,
/// which the caller persists.
#[instrument(skip_all, fields(requested = names.len()))]
pub async fn sync_sources(
    config: &mut AppConfig,
    home: &BridgeHome,
    names: &[String],
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let selected: Vec<SourceRecord> = if names.is_empty() {
        config.enabled_sources().into_iter().cloned().collect()
    } else {
        names
            .iter()
            .map(|name| {
                config
                    .get_source(name)
                    .cloned()
                    .ok_or_else(|| BridgeError::not_found(format!("source '{name}'")))
            })
            .collect::<Result<_>>()?
    };

    progress.phase("Syncing sources");
    info!(sources = selected.len(), "starting sync");

    let semaphore = Arc::new(Semaphore::new(config.concurrency()));
    let mut report = RunReport::new();
    let mut handles = Vec::new();

    for record in &selected {
        let adapter = match adapter_for(record, home) {
            Ok(adapter) => adapter,
            Err(e) => {
                record_sync_failure(&mut report, &record.name, &e);
                continue;
            }
        };
        let sem = semaphore.clone();
        let name = record.name.clone();

        handles.push((
            record.name.clone(),
            tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| BridgeError::fetch(&name, format!("sync cancelled: {e}")))?;
                tokio::task::spawn_blocking(move || adapter.sync())
                    .await
                    .map_err(|e| BridgeError::fetch(&name, format!("sync task failed: {e}")))?
            }),
        ));
    }

    let total = handles.len();
    for (i, (name, handle)) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(BridgeError::fetch(&name, format!("sync task failed: {e}"))),
        };
        match result {
            Ok(outcome) => {
                debug!(source = %name, ?outcome, "source synced");
                config.mark_synced(&name, Utc::now());
                let status = match outcome {
                    SyncOutcome::Cloned => SourceStatus::Cloned,
                    SyncOutcome::Updated => SourceStatus::Updated,
                    SyncOutcome::Current => SourceStatus::Current,
                };
                report.sources.push(SourceOutcome { name: name.clone(), status });
            }
            Err(e) => record_sync_failure(&mut report, &name, &e),
        }
        progress.source_synced(&name, i + 1, total);
    }

    info!(
        synced = report.sources.len() - report.warnings.len(),
        failed = report.warnings.len(),
        "sync completed"
    );
    progress.done(&report);
    Ok(report)
}

fn record_sync_failure(report: &mut RunReport, name: &str, error: &BridgeError) {
    let warning = Warning::new(WarningKind::Fetch, error.to_string()).with_source(name);
    warn!(%warning, "source sync failed, keeping previous snapshot");
    report.warnings.push(warning);
    report.sources.push(SourceOutcome {
        name: name.to_string(),
        status: SourceStatus::Failed {
            error: error.to_string(),
        },
    });
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// The merged tree and every warning raised while loading it.
#[derive(Debug, Default)]
pub struct BuiltTree {
    pub tree: MergedKnowledgeTree,
    pub warnings: Vec<Warning>,
}

/// Load the built-in bundle, every enabled source, and the project tree,
/// then merge them.
///
/// A source that fails to load is dropped with one warning. The project tree
/// is optional, but when present a duplicate unit or unreadable root in it
/// is fatal.
#[instrument(skip_all, fields(project = %project_root.display()))]
pub fn build_tree(
    config: &AppConfig,
    home: &BridgeHome,
    project_root: &Path,
    progress: &dyn ProgressReporter,
) -> Result<BuiltTree> {
    let mut warnings = Vec::new();

    // --- Built-in ---
    progress.phase("Loading built-in bundle");
    let builtin = match BuiltinAdapter::new().load() {
        Ok(snapshot) => {
            warnings.extend(snapshot.warnings);
            SourceLayers::new(BUILTIN_SOURCE_NAME, u32::MAX, snapshot.layers)
        }
        Err(e) => {
            warnings.push(Warning::new(WarningKind::Fetch, e.to_string()).with_source(BUILTIN_SOURCE_NAME));
            SourceLayers::new(BUILTIN_SOURCE_NAME, u32::MAX, Vec::new())
        }
    };

    // --- Registered sources ---
    progress.phase("Loading sources");
    let mut sources = Vec::new();
    for record in config.enabled_sources() {
        let loaded = adapter_for(record, home).and_then(|adapter| adapter.load());
        match loaded {
            Ok(snapshot) => {
                debug!(source = %record.name, units = snapshot.unit_count(), "source loaded");
                warnings.extend(snapshot.warnings);
                sources.push(SourceLayers::new(&record.name, record.priority, snapshot.layers));
            }
            Err(e) => {
                let warning = Warning::new(WarningKind::Fetch, e.to_string()).with_source(&record.name);
                warn!(%warning, "dropping source");
                warnings.push(warning);
            }
        }
    }

    // --- Project ---
    progress.phase("Loading project knowledge");
    let project = load_project(config, project_root, &mut warnings)?;

    // --- Merge ---
    progress.phase("Merging");
    let tree = merge::merge(&builtin, &sources, &project);
    info!(
        units = tree.len(),
        sources = sources.len(),
        warnings = warnings.len(),
        "knowledge tree built"
    );

    Ok(BuiltTree { tree, warnings })
}

/// Project-local directory for a project root.
pub fn project_dir(config: &AppConfig, project_root: &Path) -> PathBuf {
    project_root.join(&config.defaults.project_dir)
}

fn load_project(
    config: &AppConfig,
    project_root: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<KnowledgeTree> {
    let dir = project_dir(config, project_root);
    if !dir.exists() {
        debug!(dir = %dir.display(), "no project knowledge directory");
        return Ok(KnowledgeTree::new());
    }

    let load = load_root(&dir, PROJECT_SOURCE_NAME)?;
    if let Some(duplicate) = load.duplicates.into_iter().next() {
        return Err(duplicate);
    }
    warnings.extend(load.warnings);
    Ok(load.tree)
}

// ---------------------------------------------------------------------------
// Render / remove
// ---------------------------------------------------------------------------

/// Case-insensitive, order-preserving de-duplication of requested targets.
fn dedup_targets(targets: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for target in targets {
        let id = target.to_ascii_lowercase();
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Render each requested target under `dest`, concurrently and in isolation.
///
/// Outcomes come back in request order.
#[instrument(skip_all, fields(targets = targets.len(), dest = %dest.display()))]
pub async fn render_targets(
    tree: Arc<MergedKnowledgeTree>,
    targets: &[String],
    dest: &Path,
    concurrency: usize,
    progress: &dyn ProgressReporter,
) -> Vec<TargetOutcome> {
    let targets = dedup_targets(targets);
    progress.phase("Rendering targets");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::new();

    for id in &targets {
        let converter = match registry().get(id) {
            Ok(converter) => converter,
            Err(e) => {
                handles.push((id.clone(), None, Some(e)));
                continue;
            }
        };
        let sem = semaphore.clone();
        let tree = Arc::clone(&tree);
        let dest = dest.to_path_buf();
        let target = id.clone();

        let handle = tokio::spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| BridgeError::render(&target, format!("render cancelled: {e}")))?;
            tokio::task::spawn_blocking(move || converter.render(&tree, &dest))
                .await
                .map_err(|e| BridgeError::render(&target, format!("render task failed: {e}")))?
        });
        handles.push((id.clone(), Some(handle), None));
    }

    let total = handles.len();
    let mut outcomes = Vec::with_capacity(total);
    for (i, (id, handle, lookup_error)) in handles.into_iter().enumerate() {
        let result = match (handle, lookup_error) {
            (Some(handle), _) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(BridgeError::render(&id, format!("render task failed: {e}"))),
            },
            (None, Some(e)) => Err(e),
            (None, None) => Err(BridgeError::render(&id, "target was not scheduled")),
        };

        let outcome = match result {
            Ok(summary) => {
                info!(
                    target_name = %id,
                    files = summary.files.len(),
                    written = summary.written.len(),
                    removed = summary.removed.len(),
                    "target rendered"
                );
                TargetOutcome {
                    target: id.clone(),
                    result: TargetResult::Rendered {
                        files: summary.files.len(),
                        written: summary.written.len(),
                        removed: summary.removed.len(),
                    },
                }
            }
            Err(e) => {
                warn!(target_name = %id, error = %e, "target failed");
                TargetOutcome::failed(&id, e)
            }
        };
        progress.target_done(&id, i + 1, total);
        outcomes.push(outcome);
    }
    outcomes
}

/// Remove everything each requested target previously rendered under `dest`.
#[instrument(skip_all, fields(targets = targets.len(), dest = %dest.display()))]
pub fn remove_targets(
    targets: &[String],
    dest: &Path,
    progress: &dyn ProgressReporter,
) -> Vec<TargetOutcome> {
    let targets = dedup_targets(targets);
    progress.phase("Removing targets");

    let total = targets.len();
    targets
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let result = registry().get(id).and_then(|converter| converter.remove(dest));
            let outcome = match result {
                Ok(removed) => {
                    info!(target_name = %id, files = removed.len(), "target removed");
                    TargetOutcome {
                        target: id.clone(),
                        result: TargetResult::Removed {
                            files: removed.len(),
                        },
                    }
                }
                Err(e) => {
                    warn!(target_name = %id, error = %e, "target removal failed");
                    TargetOutcome::failed(id, e)
                }
            };
            progress.target_done(id, i + 1, total);
            outcome
        })
        .collect()
}

/// Every registered target identifier.
pub fn all_targets() -> Vec<String> {
    registry().list().into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_is_case_insensitive_and_ordered() {
        let targets = vec![
            "Cursor".to_string(),
            "kiro".to_string(),
            "cursor".to_string(),
        ];
        assert_eq!(dedup_targets(&targets), vec!["cursor", "kiro"]);
    }

    #[test]
    fn all_targets_lists_registry() {
        let all = all_targets();
        assert!(all.contains(&"copilot".to_string()));
        assert!(all.contains(&"agent".to_string()));
    }

    #[tokio::test]
    async fn unknown_target_fails_alone() {
        let tmp = std::env::temp_dir().join(format!("ab-pipeline-{}", uuid::Uuid::now_v7()));
        let tree = Arc::new(MergedKnowledgeTree::new());
        let outcomes = render_targets(
            tree,
            &["emacs".to_string(), "agent".to_string()],
            &tmp,
            2,
            &SilentProgress,
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_failed());
        assert!(!outcomes[1].is_failed());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn remove_without_manifest_is_empty() {
        let tmp = std::env::temp_dir().join(format!("ab-pipeline-{}", uuid::Uuid::now_v7()));
        let outcomes = remove_targets(&["cursor".to_string()], &tmp, &SilentProgress);
        assert_eq!(
            outcomes[0].result,
            TargetResult::Removed { files: 0 }
        );
    }
}
