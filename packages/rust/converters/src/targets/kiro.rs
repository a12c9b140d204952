//! Kiro target.
//!
//! Agents are JSON configurations whose prompt points at a sibling markdown
//! file. Workflows are emitted twice: as manual steering files and as prompts.

use std::path::Path;

use agentbridge_shared::{KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use serde::Serialize;
use tracing::instrument;

use super::{SkillHeader, bundle_artifacts, joined_body, mcp_artifact, yaml_document};
use crate::converter::{Artifact, Converter, TargetInfo, TargetStatus};
use crate::profiles;
use crate::registry::ConverterRegistry;
use crate::tool_config::SERVERS_KEY;

const INFO: TargetInfo = TargetInfo {
    name: "kiro",
    display_name: "Kiro",
    output_dir: ".kiro",
    status: TargetStatus::Beta,
};

/// Kiro tools that never modify the workspace; pre-approved for every agent.
const READ_ONLY_TOOLS: &[&str] = &["fs_read", "fs_list", "code_search", "web_search"];

pub struct KiroConverter;

pub fn register(registry: &mut ConverterRegistry) {
    registry.register(INFO.name, Box::new(KiroConverter));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentConfig {
    name: String,
    description: String,
    prompt: String,
    tools: Vec<String>,
    allowed_tools: Vec<String>,
}

#[derive(Serialize)]
struct SteeringHeader {
    inclusion: &'static str,
}

impl Converter for KiroConverter {
    fn info(&self) -> &TargetInfo {
        &INFO
    }

    #[instrument(skip_all, fields(target_name = INFO.name, units = tree.len()))]
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>> {
        let root = Path::new(INFO.output_dir);
        let mut artifacts = Vec::new();

        for unit in tree.units_of(KnowledgeKind::Agent) {
            let agents = root.join("agents");
            artifacts.push(Artifact::json(
                agents.join(format!("{}.json", unit.identifier)),
                &agent_config(unit),
            )?);
            artifacts.push(Artifact::text(
                agents.join(format!("{}.md", unit.identifier)),
                joined_body(unit),
            ));
        }

        for unit in tree.units_of(KnowledgeKind::Skill) {
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

        for unit in tree.units_of(KnowledgeKind::Workflow) {
            let body = joined_body(unit);
            let steering = yaml_document(INFO.name, &SteeringHeader { inclusion: "manual" }, &body)?;
            let file = format!("{}.md", unit.identifier);
            artifacts.push(Artifact::text(root.join("steering").join(&file), steering));
            artifacts.push(Artifact::text(root.join("prompts").join(&file), body));
        }

        artifacts.extend(mcp_artifact(tree, ".kiro/settings/mcp.json", SERVERS_KEY)?);
        Ok(artifacts)
    }
}

fn agent_config(unit: &KnowledgeUnit) -> AgentConfig {
    let tools = kiro_tools(&profiles::agent_tools(unit));
    let allowed_tools = tools
        .iter()
        .filter(|t| READ_ONLY_TOOLS.contains(&t.as_str()))
        .cloned()
        .collect();
    AgentConfig {
        name: profiles::display_name(unit),
        description: profiles::description(unit),
        prompt: format!("file://./{}.md", unit.identifier),
        tools,
        allowed_tools,
    }
}

/// Map generic capability names to Kiro tool names, keeping first-seen order.
/// Names without a mapping pass through.
fn kiro_tools(capabilities: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for capability in capabilities {
        let mapped: &[&str] = match capability.as_str() {
            "read" => &["fs_read", "fs_list"],
            "edit" => &["fs_write"],
            "search" => &["code_search"],
            "execute" => &["bash"],
            "web" => &["web_search", "web_fetch"],
            "agent" => &["use_subagent"],
            other => {
                if !out.iter().any(|t| t == other) {
                    out.push(other.to_string());
                }
                continue;
            }
        };
        for tool in mapped {
            if !out.iter().any(|t| t == tool) {
                out.push(tool.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::fixtures;

    #[test]
    fn output_paths() {
        let artifacts = KiroConverter.convert(&fixtures::tree()).expect("convert");
        assert_eq!(
            fixtures::paths(&artifacts),
            vec![
                ".kiro/agents/code-archaeologist.json",
                ".kiro/agents/code-archaeologist.md",
                ".kiro/agents/orchestrator.json",
                ".kiro/agents/orchestrator.md",
                ".kiro/prompts/deploy.md",
                ".kiro/settings/mcp.json",
                ".kiro/skills/clean-code/SKILL.md",
                ".kiro/skills/clean-code/checklist.md",
                ".kiro/skills/haiku-writing/SKILL.md",
                ".kiro/skills/haiku-writing/examples/basic.md",
                ".kiro/skills/rust-pro/SKILL.md",
                ".kiro/steering/deploy.md",
            ]
        );
    }

    #[test]
    fn agent_json_shape() {
        let artifacts = KiroConverter.convert(&fixtures::tree()).expect("convert");
        let json: serde_json::Value =
            serde_json::from_str(fixtures::text(&artifacts, ".kiro/agents/orchestrator.json"))
                .expect("json");
        assert_eq!(json["name"], "Orchestrator");
        assert_eq!(json["description"], "Coordinates specialist agents");
        assert_eq!(json["prompt"], "file://./orchestrator.md");
        assert_eq!(
            json["tools"],
            serde_json::json!(["fs_read", "fs_list", "code_search", "use_subagent"])
        );
        assert_eq!(
            json["allowedTools"],
            serde_json::json!(["fs_read", "fs_list", "code_search"])
        );

        let prompt = fixtures::text(&artifacts, ".kiro/agents/orchestrator.md");
        assert_eq!(prompt, "# Orchestrator\n\nPlan, then delegate.\n");
    }

    #[test]
    fn workflow_becomes_steering_and_prompt() {
        let artifacts = KiroConverter.convert(&fixtures::tree()).expect("convert");
        assert_eq!(
            fixtures::text(&artifacts, ".kiro/steering/deploy.md"),
            "---\ninclusion: manual\n---\n\n1. Build\n2. Release\n"
        );
        assert_eq!(
            fixtures::text(&artifacts, ".kiro/prompts/deploy.md"),
            "1. Build\n2. Release\n"
        );
    }

    #[test]
    fn tool_mapping_dedupes_and_passes_unknown() {
        let tools = kiro_tools(&[
            "read".to_string(),
            "search".to_string(),
            "read".to_string(),
            "@github".to_string(),
        ]);
        assert_eq!(tools, vec!["fs_read", "fs_list", "code_search", "@github"]);
    }
}
