//! OpenCode target.
//!
//! Agents and tool servers go into one aggregate `.opencode/opencode.json`;
//! skills and workflows are separate files. Project-wide instructions are
//! written to the root `AGENTS.md` and listed under `instructions`.

use std::collections::BTreeMap;
use std::path::Path;

use agentbridge_shared::{KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

use super::{SkillHeader, bundle_artifacts, joined_body, project_instructions, yaml_document};
use crate::converter::{Artifact, Converter, TargetInfo, TargetStatus};
use crate::profiles;
use crate::registry::ConverterRegistry;
use crate::tool_config;

const INFO: TargetInfo = TargetInfo {
    name: "opencode",
    display_name: "OpenCode",
    output_dir: ".opencode",
    status: TargetStatus::Beta,
};

const SCHEMA_URL: &str = "https://opencode.ai/config.json";
const INSTRUCTIONS_PATH: &str = "AGENTS.md";

pub struct OpenCodeConverter;

pub fn register(registry: &mut ConverterRegistry) {
    registry.register(INFO.name, Box::new(OpenCodeConverter));
}

#[derive(Serialize)]
struct OpenCodeConfig {
    #[serde(rename = "$schema")]
    schema: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    instructions: Vec<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    agent: BTreeMap<String, AgentEntry>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    mcp: Map<String, Value>,
}

#[derive(Serialize)]
struct AgentEntry {
    description: String,
    mode: &'static str,
    prompt: String,
    tools: BTreeMap<&'static str, bool>,
}

#[derive(Serialize)]
struct CommandHeader {
    description: String,
}

impl Converter for OpenCodeConverter {
    fn info(&self) -> &TargetInfo {
        &INFO
    }

    #[instrument(skip_all, fields(target_name = INFO.name, units = tree.len()))]
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>> {
        let root = Path::new(INFO.output_dir);
        let mut artifacts = Vec::new();

        let instructions = project_instructions(tree);
        let config = OpenCodeConfig {
            schema: SCHEMA_URL,
            instructions: if instructions.is_some() {
                vec![INSTRUCTIONS_PATH]
            } else {
                Vec::new()
            },
            agent: tree
                .units_of(KnowledgeKind::Agent)
                .map(|unit| (unit.identifier.clone(), agent_entry(unit)))
                .collect(),
            mcp: tree
                .tool_config()
                .map(tool_config::opencode_mcp)
                .unwrap_or_default(),
        };
        if !config.agent.is_empty() || !config.mcp.is_empty() || !config.instructions.is_empty() {
            artifacts.push(Artifact::json(root.join("opencode.json"), &config)?);
        }
        if let Some(instructions) = instructions {
            artifacts.push(Artifact::text(
                INSTRUCTIONS_PATH,
                format!("# Project Instructions\n\n{instructions}"),
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
            let header = CommandHeader {
                description: profiles::description(unit),
            };
            let text = yaml_document(INFO.name, &header, &joined_body(unit))?;
            artifacts.push(Artifact::text(
                root.join("commands").join(format!("{}.md", unit.identifier)),
                text,
            ));
        }

        Ok(artifacts)
    }
}

fn agent_entry(unit: &KnowledgeUnit) -> AgentEntry {
    let capabilities = profiles::agent_tools(unit);
    let has = |c: &str| capabilities.iter().any(|t| t == c);
    let can_edit = has("edit");

    AgentEntry {
        description: profiles::description(unit),
        mode: if profiles::is_orchestrator(unit) {
            "primary"
        } else {
            "subagent"
        },
        prompt: joined_body(unit),
        tools: BTreeMap::from([
            ("bash", has("execute")),
            ("edit", can_edit),
            ("write", can_edit),
        ]),
    }
}
