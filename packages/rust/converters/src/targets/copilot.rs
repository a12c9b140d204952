//! GitHub Copilot target.
//!
//! - agents: `.github/agents/<id>.md` (custom agent profile)
//! - skills: `.github/skills/<name>/SKILL.md` plus sibling files
//! - workflows: `.github/prompts/<id>.prompt.md`
//! - tool config: `.vscode/mcp.json` under the `servers` key

use std::path::Path;

use agentbridge_markdown::{normalize_skill_name, truncate_chars};
use agentbridge_shared::{KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use serde::Serialize;
use tracing::{instrument, warn};

use super::{SkillHeader, StemSet, bundle_artifacts, joined_body, mcp_artifact, yaml_document};
use crate::converter::{Artifact, Converter, TargetInfo, TargetStatus};
use crate::profiles::{self, Handoff};
use crate::registry::ConverterRegistry;

const INFO: TargetInfo = TargetInfo {
    name: "copilot",
    display_name: "GitHub Copilot",
    output_dir: ".github",
    status: TargetStatus::Stable,
};

/// Agent descriptions are shown in a dropdown.
const AGENT_DESCRIPTION_MAX: usize = 150;
const SKILL_DESCRIPTION_MAX: usize = 1024;
const SKILL_NAME_MAX: usize = 64;
const AGENT_BODY_MAX: usize = 30_000;
const BODY_TRUNCATION_SUFFIX: &str = "\n\n... (truncated)\n";

const MCP_PATH: &str = ".vscode/mcp.json";

pub struct CopilotConverter;

pub fn register(registry: &mut ConverterRegistry) {
    registry.register(INFO.name, Box::new(CopilotConverter));
}

#[derive(Serialize)]
struct AgentHeader {
    name: String,
    description: String,
    tools: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    handoffs: Vec<Handoff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agents: Option<Vec<&'static str>>,
    #[serde(rename = "user-invokable", skip_serializing_if = "Option::is_none")]
    user_invokable: Option<bool>,
}

#[derive(Serialize)]
struct PromptHeader {
    description: String,
    mode: &'static str,
}

impl Converter for CopilotConverter {
    fn info(&self) -> &TargetInfo {
        &INFO
    }

    #[instrument(skip_all, fields(target_name = INFO.name, units = tree.len()))]
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>> {
        let root = Path::new(INFO.output_dir);
        let mut artifacts = Vec::new();

        for unit in tree.units_of(KnowledgeKind::Agent) {
            artifacts.push(agent_artifact(root, unit)?);
        }
        let mut skill_names = StemSet::new();
        for unit in tree.units_of(KnowledgeKind::Skill) {
            artifacts.extend(skill_artifacts(root, unit, &mut skill_names)?);
        }
        for unit in tree.units_of(KnowledgeKind::Workflow) {
            let header = PromptHeader {
                description: profiles::description(unit),
                mode: "agent",
            };
            let text = yaml_document(INFO.name, &header, &joined_body(unit))?;
            let path = root
                .join("prompts")
                .join(format!("{}.prompt.md", unit.identifier));
            artifacts.push(Artifact::text(path, text));
        }

        artifacts.extend(mcp_artifact(tree, MCP_PATH, "servers")?);
        Ok(artifacts)
    }
}

fn agent_artifact(root: &Path, unit: &KnowledgeUnit) -> Result<Artifact> {
    let header = AgentHeader {
        name: profiles::display_name(unit),
        description: truncate_chars(&profiles::description(unit), AGENT_DESCRIPTION_MAX, ""),
        tools: profiles::agent_tools(unit),
        handoffs: profiles::handoffs(unit),
        agents: profiles::is_orchestrator(unit).then(|| vec!["*"]),
        user_invokable: profiles::is_hidden(unit).then_some(false),
    };
    let body = truncate_chars(&joined_body(unit), AGENT_BODY_MAX, BODY_TRUNCATION_SUFFIX);
    let text = yaml_document(INFO.name, &header, &body)?;
    Ok(Artifact::text(
        root.join("agents").join(format!("{}.md", unit.identifier)),
        text,
    ))
}

/// Skill directory names must match `[a-z0-9-]{1,64}`. Identifiers that
/// normalize to a name already in use get a numeric suffix.
fn skill_artifacts(
    root: &Path,
    unit: &KnowledgeUnit,
    names: &mut StemSet,
) -> Result<Vec<Artifact>> {
    let mut normalized = normalize_skill_name(&unit.identifier);
    if normalized.is_empty() {
        normalized = "skill".to_string();
    }
    let name = names.claim(&normalized, "", SKILL_NAME_MAX);
    if name != normalized {
        warn!(skill = %unit.identifier, name = %name, "skill name already taken, renamed");
    }
    let header = SkillHeader {
        name: name.clone(),
        description: truncate_chars(&profiles::description(unit), SKILL_DESCRIPTION_MAX, ""),
    };
    let text = yaml_document(INFO.name, &header, unit.body())?;
    Ok(bundle_artifacts(
        &root.join("skills").join(&name),
        "SKILL.md",
        text,
        unit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::fixtures;
    use agentbridge_shared::MetaValue;

    #[test]
    fn output_paths() {
        let artifacts = CopilotConverter.convert(&fixtures::tree()).expect("convert");
        assert_eq!(
            fixtures::paths(&artifacts),
            vec![
                ".github/agents/code-archaeologist.md",
                ".github/agents/orchestrator.md",
                ".github/prompts/deploy.prompt.md",
                ".github/skills/clean-code/SKILL.md",
                ".github/skills/clean-code/checklist.md",
                ".github/skills/haiku-writing/SKILL.md",
                ".github/skills/haiku-writing/examples/basic.md",
                ".github/skills/rust-pro/SKILL.md",
                ".vscode/mcp.json",
            ]
        );
    }

    #[test]
    fn orchestrator_profile() {
        let artifacts = CopilotConverter.convert(&fixtures::tree()).expect("convert");
        let text = fixtures::text(&artifacts, ".github/agents/orchestrator.md");
        assert!(text.starts_with("---\nname: Orchestrator\n"));
        assert!(text.contains("description: Coordinates specialist agents\n"));
        assert!(text.contains("- '*'") || text.contains("- \"*\""));
        assert!(text.contains("agent: frontend-specialist"));
        assert!(!text.contains("user-invokable"));
        assert!(text.ends_with("---\n\n# Orchestrator\n\nPlan, then delegate.\n"));
    }

    #[test]
    fn hidden_agent_is_not_user_invokable() {
        let artifacts = CopilotConverter.convert(&fixtures::tree()).expect("convert");
        let text = fixtures::text(&artifacts, ".github/agents/code-archaeologist.md");
        assert!(text.contains("user-invokable: false"));
        assert!(!text.contains("agents:"));
    }

    #[test]
    fn limits_are_applied() {
        let mut tree = MergedKnowledgeTree::new();
        let long_body = "x".repeat(AGENT_BODY_MAX + 10);
        tree.place(
            fixtures::unit(
                KnowledgeKind::Agent,
                "verbose",
                &[("description", MetaValue::from("d".repeat(400)))],
                &[("verbose.md", long_body.as_str())],
            ),
            "fixture",
        );
        tree.place(
            fixtures::unit(
                KnowledgeKind::Skill,
                "Fancy Skill!",
                &[("description", MetaValue::from("s".repeat(2000)))],
                &[("SKILL.md", "body")],
            ),
            "fixture",
        );

        let artifacts = CopilotConverter.convert(&tree).expect("convert");
        let agent = fixtures::text(&artifacts, ".github/agents/verbose.md");
        assert!(agent.contains(&format!("description: {}\n", "d".repeat(150))));
        assert!(!agent.contains(&"d".repeat(151)));
        assert!(agent.ends_with(BODY_TRUNCATION_SUFFIX));
        let body = agent.split("---\n\n").nth(1).expect("body");
        assert_eq!(body.chars().count(), AGENT_BODY_MAX);

        let skill = fixtures::text(&artifacts, ".github/skills/fancy-skill/SKILL.md");
        assert!(skill.starts_with("---\nname: fancy-skill\n"));
        assert!(skill.contains(&"s".repeat(1024)));
        assert!(!skill.contains(&"s".repeat(1025)));
    }

    #[test]
    fn colliding_skill_names_are_disambiguated() {
        let mut tree = MergedKnowledgeTree::new();
        for (id, body) in [("Foo", "upper\n"), ("foo", "lower\n")] {
            tree.place(
                fixtures::unit(KnowledgeKind::Skill, id, &[], &[("SKILL.md", body)]),
                "fixture",
            );
        }

        let artifacts = CopilotConverter.convert(&tree).expect("convert");
        let first = fixtures::text(&artifacts, ".github/skills/foo/SKILL.md");
        let second = fixtures::text(&artifacts, ".github/skills/foo-2/SKILL.md");
        assert!(first.starts_with("---\nname: foo\n") && first.ends_with("upper\n"));
        assert!(second.starts_with("---\nname: foo-2\n") && second.ends_with("lower\n"));

        let dest = std::env::temp_dir().join(format!("ab-copilot-{}", uuid::Uuid::now_v7()));
        assert!(CopilotConverter.render(&tree, &dest).is_ok());
        let _ = std::fs::remove_dir_all(&dest);
    }

    #[test]
    fn agent_segments_are_joined_with_delimiter() {
        let mut tree = MergedKnowledgeTree::new();
        tree.place(
            fixtures::unit(
                KnowledgeKind::Agent,
                "reviewer",
                &[],
                &[("AGENT.md", "main\n"), ("reference.md", "ref\n")],
            ),
            "fixture",
        );
        let artifacts = CopilotConverter.convert(&tree).expect("convert");
        let text = fixtures::text(&artifacts, ".github/agents/reviewer.md");
        assert!(text.ends_with(
            "main\n\n<!-- agent-bridge:segment name=\"reference.md\" -->\nref\n"
        ));
    }

    #[test]
    fn mcp_uses_servers_key() {
        let artifacts = CopilotConverter.convert(&fixtures::tree()).expect("convert");
        let json: serde_json::Value =
            serde_json::from_str(fixtures::text(&artifacts, ".vscode/mcp.json")).expect("json");
        assert_eq!(json["servers"]["github"]["command"], "npx");
        assert!(json.get("mcpServers").is_none());
    }
}
