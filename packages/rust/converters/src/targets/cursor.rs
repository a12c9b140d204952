//! Cursor target.
//!
//! Skills with an activation become MDC rules; the rest stay skill bundles.
//! An always-applied `project-instructions` rule carries the project-wide
//! instructions.

use std::path::Path;

use agentbridge_shared::{KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use serde::Serialize;
use tracing::instrument;

use super::{
    SkillHeader, StemSet, bundle_artifacts, joined_body, mcp_artifact, project_instructions,
    yaml_document,
};
use crate::converter::{Artifact, Converter, TargetInfo, TargetStatus};
use crate::profiles::{self, Activation};
use crate::registry::ConverterRegistry;
use crate::tool_config::SERVERS_KEY;

const INFO: TargetInfo = TargetInfo {
    name: "cursor",
    display_name: "Cursor",
    output_dir: ".cursor",
    status: TargetStatus::Stable,
};

const INSTRUCTIONS_RULE: &str = "project-instructions";
const INSTRUCTIONS_DESCRIPTION: &str = "Project-specific instructions and architecture guidelines";

pub struct CursorConverter;

pub fn register(registry: &mut ConverterRegistry) {
    registry.register(INFO.name, Box::new(CursorConverter));
}

#[derive(Serialize)]
struct AgentHeader {
    name: String,
    description: String,
}

impl Converter for CursorConverter {
    fn info(&self) -> &TargetInfo {
        &INFO
    }

    #[instrument(skip_all, fields(target_name = INFO.name, units = tree.len()))]
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>> {
        let root = Path::new(INFO.output_dir);
        let mut artifacts = Vec::new();

        for unit in tree.units_of(KnowledgeKind::Agent) {
            let header = AgentHeader {
                name: profiles::display_name(unit),
                description: profiles::description(unit),
            };
            let text = yaml_document(INFO.name, &header, &joined_body(unit))?;
            artifacts.push(Artifact::text(
                root.join("agents").join(format!("{}.md", unit.identifier)),
                text,
            ));
        }

        let mut rule_stems = StemSet::new();
        for unit in tree.units_of(KnowledgeKind::Skill) {
            match profiles::activation(unit) {
                Some(activation) => {
                    let stem = rule_stems.claim(&unit.identifier, "", usize::MAX);
                    artifacts.push(Artifact::text(
                        root.join("rules").join(format!("{stem}.mdc")),
                        mdc_rule(unit, activation),
                    ));
                }
                None => {
                    let header = SkillHeader {
                        name: unit.identifier.clone(),
                        description: profiles::description(unit),
                    };
                    let text = yaml_document(INFO.name, &header, unit.body())?;
                    artifacts.extend(bundle_artifacts(
                        &root.join("skills").join(&unit.identifier),
                        "SKILL.md",
                        text,
                        unit,
                    ));
                }
            }
        }

        for unit in tree.units_of(KnowledgeKind::Workflow) {
            artifacts.push(Artifact::text(
                root.join("commands").join(format!("{}.md", unit.identifier)),
                joined_body(unit),
            ));
        }

        if let Some(instructions) = project_instructions(tree) {
            let stem = rule_stems.claim(INSTRUCTIONS_RULE, "", usize::MAX);
            artifacts.push(Artifact::text(
                root.join("rules").join(format!("{stem}.mdc")),
                mdc_document(INSTRUCTIONS_DESCRIPTION, "", true, &instructions),
            ));
        }

        artifacts.extend(mcp_artifact(tree, ".cursor/mcp.json", SERVERS_KEY)?);
        Ok(artifacts)
    }
}

/// MDC header values are written unquoted, one per line.
fn mdc_rule(unit: &KnowledgeUnit, activation: Activation) -> String {
    let description = match activation {
        Activation::Manual => String::new(),
        _ => profiles::description(unit),
    };
    let globs = match activation {
        Activation::Glob => profiles::globs(unit).join(","),
        _ => String::new(),
    };
    let always = activation == Activation::Always;
    mdc_document(&description, &globs, always, &joined_body(unit))
}

fn mdc_document(description: &str, globs: &str, always: bool, body: &str) -> String {
    format!("---\ndescription: {description}\nglobs: {globs}\nalwaysApply: {always}\n---\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::fixtures;
    use agentbridge_shared::MetaValue;

    #[test]
    fn output_paths() {
        let artifacts = CursorConverter.convert(&fixtures::tree()).expect("convert");
        assert_eq!(
            fixtures::paths(&artifacts),
            vec![
                ".cursor/agents/code-archaeologist.md",
                ".cursor/agents/orchestrator.md",
                ".cursor/commands/deploy.md",
                ".cursor/mcp.json",
                ".cursor/rules/clean-code.mdc",
                ".cursor/rules/project-instructions.mdc",
                ".cursor/rules/rust-pro.mdc",
                ".cursor/skills/haiku-writing/SKILL.md",
                ".cursor/skills/haiku-writing/examples/basic.md",
            ]
        );
    }

    #[test]
    fn always_rule_concatenates_segments() {
        let artifacts = CursorConverter.convert(&fixtures::tree()).expect("convert");
        let rule = fixtures::text(&artifacts, ".cursor/rules/clean-code.mdc");
        assert_eq!(
            rule,
            "---\ndescription: Core coding standards\nglobs: \nalwaysApply: true\n---\n\n\
             # Clean Code\n\nKeep functions small.\n\n\
             <!-- agent-bridge:segment name=\"checklist.md\" -->\n- [ ] names\n"
        );
    }

    #[test]
    fn glob_rule_joins_globs_with_commas() {
        let artifacts = CursorConverter.convert(&fixtures::tree()).expect("convert");
        let rule = fixtures::text(&artifacts, ".cursor/rules/rust-pro.mdc");
        assert!(rule.contains("globs: **/*.rs,**/Cargo.toml\nalwaysApply: false\n"));
    }

    #[test]
    fn manual_rule_has_no_description() {
        let mut tree = MergedKnowledgeTree::new();
        tree.place(
            fixtures::unit(
                KnowledgeKind::Skill,
                "pentest",
                &[
                    ("activation", MetaValue::from("manual")),
                    ("description", MetaValue::from("Offensive checks")),
                ],
                &[("SKILL.md", "body\n")],
            ),
            "fixture",
        );
        let artifacts = CursorConverter.convert(&tree).expect("convert");
        let rule = fixtures::text(&artifacts, ".cursor/rules/pentest.mdc");
        assert!(rule.starts_with("---\ndescription: \nglobs: \nalwaysApply: false\n---\n"));
    }

    #[test]
    fn project_instructions_rule_always_applies() {
        let artifacts = CursorConverter.convert(&fixtures::tree()).expect("convert");
        let rule = fixtures::text(&artifacts, ".cursor/rules/project-instructions.mdc");
        assert!(rule.starts_with(
            "---\ndescription: Project-specific instructions and architecture guidelines\n\
             globs: \nalwaysApply: true\n---\n\n# Clean Code\n"
        ));
        assert!(rule.contains("- **Deploy** (`deploy`): Ship to production\n"));
    }

    #[test]
    fn skill_named_like_the_instructions_rule_keeps_its_name() {
        let mut tree = MergedKnowledgeTree::new();
        tree.place(
            fixtures::unit(
                KnowledgeKind::Skill,
                INSTRUCTIONS_RULE,
                &[("activation", MetaValue::from("always"))],
                &[("SKILL.md", "team rules\n")],
            ),
            "fixture",
        );
        let artifacts = CursorConverter.convert(&tree).expect("convert");
        assert!(
            fixtures::text(&artifacts, ".cursor/rules/project-instructions.mdc")
                .ends_with("team rules\n")
        );
        assert!(
            fixtures::text(&artifacts, ".cursor/rules/project-instructions-2.mdc")
                .contains("alwaysApply: true")
        );
    }

    #[test]
    fn mcp_keeps_mcp_servers_key() {
        let artifacts = CursorConverter.convert(&fixtures::tree()).expect("convert");
        let json: serde_json::Value =
            serde_json::from_str(fixtures::text(&artifacts, ".cursor/mcp.json")).expect("json");
        assert_eq!(json["mcpServers"]["github"]["args"][0], "-y");
    }
}
