//! Build a [`KnowledgeTree`] from a knowledge root.
//!
//! Problems with individual files become warnings and the affected unit is
//! skipped. Duplicate keys are returned separately so callers can decide
//! whether they are recoverable.

use std::path::{Path, PathBuf};

use agentbridge_markdown::{parse_document, strip_bom};
use agentbridge_shared::{
    BridgeError, KnowledgeKind, KnowledgeTree, KnowledgeUnit, Result, Segment, Warning,
    WarningKind,
};
use tracing::{debug, instrument, warn};

use crate::layout::{self, LayoutEntry, slash_path};

/// File holding the tool-access configuration inside a knowledge root.
pub const TOOL_CONFIG_FILE: &str = "mcp_config.json";

/// A tree built from one root.
#[derive(Debug, Default)]
pub struct RootLoad {
    pub tree: KnowledgeTree,
    pub warnings: Vec<Warning>,
    /// Units whose key was already taken inside this root.
    pub duplicates: Vec<BridgeError>,
}

/// A file supplied to [`build_unit`]: path relative to the root and raw bytes.
pub struct UnitFile<'a> {
    pub rel_path: PathBuf,
    pub bytes: &'a [u8],
}

/// Load every unit and the tool config under `root`.
#[instrument(skip_all, fields(source = source_name, root = %root.display()))]
pub fn load_root(root: &Path, source_name: &str) -> Result<RootLoad> {
    if !root.is_dir() {
        return Err(BridgeError::fetch(
            source_name,
            format!("knowledge root {} is not a directory", root.display()),
        ));
    }

    let mut load = RootLoad::default();

    for kind in KnowledgeKind::UNIT_KINDS {
        let kind_dir = root.join(kind.dir_name());
        let (files, scan_issues) = match layout::scan_kind_dir(&kind_dir) {
            Ok(scanned) => scanned,
            Err(e) => {
                load.record(malformed(source_name, kind_dir.clone(), e.to_string()));
                continue;
            }
        };
        for (path, reason) in scan_issues {
            load.record(malformed(source_name, path, reason));
        }

        let planned = layout::plan_entries(kind, &files);
        for (path, reason) in planned.issues {
            load.record(malformed(source_name, kind_dir.join(path), reason));
        }

        for entry in planned.entries {
            let mut contents = Vec::new();
            let mut unreadable = None;
            for file in entry.files() {
                let abs = kind_dir.join(file);
                match std::fs::read(&abs) {
                    Ok(bytes) => contents.push((Path::new(kind.dir_name()).join(file), bytes)),
                    Err(e) => {
                        unreadable = Some(malformed(source_name, abs, e.to_string()));
                        break;
                    }
                }
            }
            if let Some(warning) = unreadable {
                load.record(warning);
                continue;
            }

            let files: Vec<UnitFile<'_>> = contents
                .iter()
                .map(|(rel_path, bytes)| UnitFile {
                    rel_path: rel_path.clone(),
                    bytes,
                })
                .collect();
            load.add_unit(kind, &entry, &files, source_name, root);
        }
    }

    load.tree.tool_config = load_tool_config(root, source_name, &mut load.warnings);

    debug!(
        units = load.tree.len(),
        warnings = load.warnings.len(),
        "loaded knowledge root"
    );
    Ok(load)
}

impl RootLoad {
    fn record(&mut self, warning: Warning) {
        warn!(%warning, "skipping");
        self.warnings.push(warning);
    }

    /// Build a unit from a layout entry and insert it, recording problems.
    pub fn add_unit(
        &mut self,
        kind: KnowledgeKind,
        entry: &LayoutEntry,
        files: &[UnitFile<'_>],
        source_name: &str,
        root: &Path,
    ) {
        let unit_dir = Path::new(kind.dir_name()).join(entry.unit_dir());
        match build_unit(kind, &entry.identifier(), &unit_dir, files, source_name) {
            Ok((unit, dropped)) => {
                if !dropped.is_empty() {
                    let primary = files.first().map(|f| f.rel_path.clone()).unwrap_or_default();
                    self.record(
                        Warning::new(
                            WarningKind::Metadata,
                            format!("dropped unsupported frontmatter keys: {}", dropped.join(", ")),
                        )
                        .with_source(source_name)
                        .with_path(primary),
                    );
                }
                if let Err(e) = self.tree.insert(unit) {
                    warn!(error = %e, root = %root.display(), "duplicate unit in root");
                    self.duplicates.push(e);
                }
            }
            Err(e) => {
                let (path, reason) = match e {
                    BridgeError::MalformedUnit { path, reason } => (path, reason),
                    other => (unit_dir.clone(), other.to_string()),
                };
                self.record(malformed(source_name, path, reason));
            }
        }
    }
}

/// Assemble one unit from its files (primary first).
///
/// Returns the unit and any frontmatter keys that were dropped.
pub fn build_unit(
    kind: KnowledgeKind,
    identifier: &str,
    unit_dir: &Path,
    files: &[UnitFile<'_>],
    source_name: &str,
) -> Result<(KnowledgeUnit, Vec<String>)> {
    let Some(primary) = files.first() else {
        return Err(BridgeError::malformed(unit_dir, "unit has no documents"));
    };
    if identifier.trim().is_empty() {
        return Err(BridgeError::malformed(&primary.rel_path, "missing identifier"));
    }

    let mut unit = KnowledgeUnit::new(kind, identifier);
    let mut dropped = Vec::new();

    for (i, file) in files.iter().enumerate() {
        let text = std::str::from_utf8(file.bytes)
            .map_err(|e| BridgeError::malformed(&file.rel_path, format!("not valid UTF-8: {e}")))?;
        let text = strip_bom(text);

        let body = if i == 0 {
            let doc = parse_document(text)
                .map_err(|e| BridgeError::malformed(&file.rel_path, e.to_string()))?;
            unit.metadata = doc.metadata;
            dropped = doc.dropped_keys;
            doc.body
        } else {
            text.to_string()
        };

        let name = file
            .rel_path
            .strip_prefix(unit_dir)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .map(slash_path)
            .unwrap_or_else(|| slash_path(&file.rel_path));

        unit.segments.push(Segment {
            name,
            origin: format!("{source_name}:{}", slash_path(&file.rel_path)),
            body,
        });
    }

    Ok((unit, dropped))
}

fn load_tool_config(
    root: &Path,
    source_name: &str,
    warnings: &mut Vec<Warning>,
) -> Option<serde_json::Value> {
    let path = root.join(TOOL_CONFIG_FILE);
    if !path.is_file() {
        return None;
    }
    let parsed = std::fs::read(&path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| parse_tool_config(&bytes));

    match parsed {
        Ok(value) => Some(value),
        Err(reason) => {
            let warning = Warning::new(WarningKind::ToolConfig, reason)
                .with_source(source_name)
                .with_path(path);
            warn!(%warning, "ignoring tool config");
            warnings.push(warning);
            None
        }
    }
}

/// Parse tool config bytes; the payload must be a JSON object.
pub fn parse_tool_config(bytes: &[u8]) -> std::result::Result<serde_json::Value, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {e}"))?;
    let value: serde_json::Value =
        serde_json::from_str(strip_bom(text)).map_err(|e| format!("invalid JSON: {e}"))?;
    if !value.is_object() {
        return Err("tool config must be a JSON object".into());
    }
    Ok(value)
}

fn malformed(source_name: &str, path: PathBuf, reason: impl Into<String>) -> Warning {
    Warning::new(WarningKind::MalformedUnit, reason)
        .with_source(source_name)
        .with_path(path)
}
