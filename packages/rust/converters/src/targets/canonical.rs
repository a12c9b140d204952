//! Canonical kit target: re-emits the knowledge source layout.
//!
//! The output is itself a valid local source, so the local adapter is the
//! reverse reader of this converter.

use std::path::{Path, PathBuf};

use agentbridge_markdown::render_document;
use agentbridge_shared::{KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use tracing::instrument;

use super::bundle_artifacts;
use crate::converter::{Artifact, Converter, TargetInfo, TargetStatus};
use crate::registry::ConverterRegistry;

const INFO: TargetInfo = TargetInfo {
    name: "agent",
    display_name: "Canonical kit",
    output_dir: ".agent-bridge/kit",
    status: TargetStatus::Stable,
};

const TOOL_CONFIG_FILE: &str = "mcp_config.json";

pub struct CanonicalConverter;

pub fn register(registry: &mut ConverterRegistry) {
    registry.register(INFO.name, Box::new(CanonicalConverter));
}

impl Converter for CanonicalConverter {
    fn info(&self) -> &TargetInfo {
        &INFO
    }

    #[instrument(skip_all, fields(target_name = INFO.name, units = tree.len()))]
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>> {
        let root = Path::new(INFO.output_dir);
        let mut artifacts = Vec::new();

        for unit in tree.units() {
            artifacts.extend(unit_artifacts(root, unit)?);
        }

        if let Some(config) = tree.tool_config() {
            artifacts.push(Artifact::json(root.join(TOOL_CONFIG_FILE), config)?);
        }
        Ok(artifacts)
    }
}

/// Skills always become bundles; agents and workflows only when they carry
/// related segments.
fn unit_artifacts(root: &Path, unit: &KnowledgeUnit) -> Result<Vec<Artifact>> {
    let kind_dir = root.join(unit.kind.dir_name());
    let primary = render_document(&unit.metadata, unit.body())?;

    let bundled = unit.kind == KnowledgeKind::Skill || !unit.related().is_empty();
    if !bundled {
        let path: PathBuf = kind_dir.join(format!("{}.md", unit.identifier));
        return Ok(vec![Artifact::text(path, primary)]);
    }

    let primary_name = unit.kind.primary_file_name().unwrap_or("README.md");
    Ok(bundle_artifacts(
        &kind_dir.join(&unit.identifier),
        primary_name,
        primary,
        unit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::fixtures;
    use agentbridge_shared::MetaValue;
    use agentbridge_sources::{LocalAdapter, SourceAdapter};

    #[test]
    fn layout_mirrors_source_layout() {
        let artifacts = CanonicalConverter.convert(&fixtures::tree()).expect("convert");
        assert_eq!(
            fixtures::paths(&artifacts),
            vec![
                ".agent-bridge/kit/agents/code-archaeologist.md",
                ".agent-bridge/kit/agents/orchestrator.md",
                ".agent-bridge/kit/mcp_config.json",
                ".agent-bridge/kit/skills/clean-code/SKILL.md",
                ".agent-bridge/kit/skills/clean-code/checklist.md",
                ".agent-bridge/kit/skills/haiku-writing/SKILL.md",
                ".agent-bridge/kit/skills/haiku-writing/examples/basic.md",
                ".agent-bridge/kit/skills/rust-pro/SKILL.md",
                ".agent-bridge/kit/workflows/deploy.md",
            ]
        );
        let skill = fixtures::text(&artifacts, ".agent-bridge/kit/skills/clean-code/SKILL.md");
        assert!(skill.starts_with("---\ndescription: Core coding standards\n---\n\n# Clean Code"));
    }

    #[test]
    fn local_adapter_reads_rendered_kit() {
        let tmp = std::env::temp_dir().join(format!("ab-kit-{}", uuid::Uuid::now_v7()));

        let mut tree = MergedKnowledgeTree::new();
        tree.place(
            fixtures::unit(
                KnowledgeKind::Skill,
                "s",
                &[
                    ("activation", MetaValue::from("always")),
                    ("description", MetaValue::from("x")),
                ],
                &[("SKILL.md", "hello")],
            ),
            "fixture",
        );
        CanonicalConverter.render(&tree, &tmp).expect("render");

        let adapter = LocalAdapter::new("kit", tmp.join(INFO.output_dir), Vec::new());
        let snapshot = adapter.load().expect("load");
        assert!(snapshot.warnings.is_empty(), "{:?}", snapshot.warnings);

        let unit = snapshot.layers[0]
            .get(KnowledgeKind::Skill, "s")
            .expect("skill");
        let meta: Vec<(&str, String)> = unit
            .metadata
            .iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        assert_eq!(
            meta,
            vec![("activation", "always".to_string()), ("description", "x".to_string())]
        );
        assert_eq!(unit.body(), "hello");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bundles_round_trip_with_tool_config() {
        let tmp = std::env::temp_dir().join(format!("ab-kit-{}", uuid::Uuid::now_v7()));
        let tree = fixtures::tree();
        CanonicalConverter.render(&tree, &tmp).expect("render");

        let snapshot = LocalAdapter::new("kit", tmp.join(INFO.output_dir), Vec::new())
            .load()
            .expect("load");
        let layer = &snapshot.layers[0];
        assert_eq!(layer.len(), tree.len());

        let haiku = layer.get(KnowledgeKind::Skill, "haiku-writing").expect("haiku");
        let names: Vec<&str> = haiku.segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SKILL.md", "examples/basic.md"]);
        assert_eq!(haiku.segments[1].body, "An old silent pond\n");
        assert_eq!(layer.tool_config.as_ref(), tree.tool_config());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn render_twice_is_byte_identical() {
        let tmp = std::env::temp_dir().join(format!("ab-kit-{}", uuid::Uuid::now_v7()));
        let tree = fixtures::tree();

        CanonicalConverter.render(&tree, &tmp).expect("first render");
        let first = std::fs::read(tmp.join(".agent-bridge/kit/skills/clean-code/SKILL.md"))
            .expect("read");
        let summary = CanonicalConverter.render(&tree, &tmp).expect("second render");
        let second = std::fs::read(tmp.join(".agent-bridge/kit/skills/clean-code/SKILL.md"))
            .expect("read");

        assert_eq!(first, second);
        assert!(summary.written.is_empty());
        assert!(summary.removed.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
