//! The bundle compiled into the binary. Always available, never fetched.

use std::path::{Path, PathBuf};

use agentbridge_shared::{
    BUILTIN_SOURCE_NAME, KnowledgeKind, Result, SourceOrigin, Warning, WarningKind,
};
use tracing::instrument;

use super::{SourceAdapter, SourceSnapshot, SyncOutcome};
use crate::layout::{self, LayoutEntry};
use crate::loader::{RootLoad, UnitFile};

/// Bundle version; pinned to the crate release.
pub const BUILTIN_BUNDLE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `(path relative to the bundle root, contents)`.
const BUNDLE: &[(&str, &str)] = &[
    (
        "agents/orchestrator.md",
        include_str!("../../bundle/agents/orchestrator.md"),
    ),
    (
        "skills/clean-code/SKILL.md",
        include_str!("../../bundle/skills/clean-code/SKILL.md"),
    ),
    (
        "skills/clean-code/checklist.md",
        include_str!("../../bundle/skills/clean-code/checklist.md"),
    ),
    (
        "workflows/plan.md",
        include_str!("../../bundle/workflows/plan.md"),
    ),
];

/// Source backed by [`BUNDLE`].
pub struct BuiltinAdapter {
    name: String,
}

impl BuiltinAdapter {
    pub fn new() -> Self {
        Self::named(BUILTIN_SOURCE_NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for BuiltinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for BuiltinAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Builtin
    }

    fn sync(&self) -> Result<SyncOutcome> {
        Ok(SyncOutcome::Current)
    }

    #[instrument(skip_all, fields(source = %self.name, version = BUILTIN_BUNDLE_VERSION))]
    fn load(&self) -> Result<SourceSnapshot> {
        let mut load = RootLoad::default();

        for kind in KnowledgeKind::UNIT_KINDS {
            let prefix = Path::new(kind.dir_name());
            let files: Vec<PathBuf> = BUNDLE
                .iter()
                .filter_map(|(path, _)| Path::new(path).strip_prefix(prefix).ok())
                .map(Path::to_path_buf)
                .collect();

            for entry in layout::plan_entries(kind, &files).entries {
                let unit_files = bundle_files(prefix, &entry);
                load.add_unit(kind, &entry, &unit_files, &self.name, Path::new("<builtin>"));
            }
        }

        let mut warnings = load.warnings;
        warnings.extend(load.duplicates.into_iter().map(|e| {
            Warning::new(WarningKind::MalformedUnit, e.to_string()).with_source(&self.name)
        }));

        Ok(SourceSnapshot {
            source: self.name.clone(),
            layers: vec![load.tree],
            warnings,
        })
    }

    fn checkout_path(&self) -> Option<&Path> {
        None
    }
}

fn bundle_files(prefix: &Path, entry: &LayoutEntry) -> Vec<UnitFile<'static>> {
    entry
        .files()
        .into_iter()
        .filter_map(|file| {
            let rel_path = prefix.join(file);
            BUNDLE
                .iter()
                .find(|(path, _)| Path::new(path) == rel_path)
                .map(|(_, contents)| UnitFile {
                    rel_path,
                    bytes: contents.as_bytes(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_loads_cleanly() {
        let snapshot = BuiltinAdapter::new().load().expect("load");
        assert!(snapshot.warnings.is_empty(), "{:?}", snapshot.warnings);
        assert_eq!(snapshot.layers.len(), 1);

        let tree = &snapshot.layers[0];
        assert!(tree.get(KnowledgeKind::Agent, "orchestrator").is_some());
        assert!(tree.get(KnowledgeKind::Workflow, "plan").is_some());

        let skill = tree.get(KnowledgeKind::Skill, "clean-code").expect("skill");
        assert_eq!(skill.segments.len(), 2);
        assert_eq!(skill.segments[1].name, "checklist.md");
        assert_eq!(skill.metadata.get_str("activation"), Some("always"));
        assert_eq!(skill.segments[0].origin, "builtin:skills/clean-code/SKILL.md");
    }

    #[test]
    fn sync_is_noop() {
        assert_eq!(BuiltinAdapter::new().sync().expect("sync"), SyncOutcome::Current);
    }
}
