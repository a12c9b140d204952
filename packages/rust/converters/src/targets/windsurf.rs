//! Windsurf target.
//!
//! Skills and agents both become rules with a bold-markdown activation
//! header. Rule and workflow files are capped at the Windsurf size limit.
//! An agent whose identifier is already a skill rule is written as
//! `agent-<id>.md`. The legacy root `.windsurfrules` carries the project
//! instructions.

use std::path::Path;

use agentbridge_markdown::truncate_chars;
use agentbridge_shared::{KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use serde::Serialize;
use tracing::{instrument, warn};

use super::{StemSet, joined_body, mcp_artifact, project_instructions, yaml_document};
use crate::converter::{Artifact, Converter, TargetInfo, TargetStatus};
use crate::profiles::{self, Activation};
use crate::registry::ConverterRegistry;
use crate::tool_config::SERVERS_KEY;

const INFO: TargetInfo = TargetInfo {
    name: "windsurf",
    display_name: "Windsurf",
    output_dir: ".windsurf",
    status: TargetStatus::Beta,
};

const RULE_CHAR_LIMIT: usize = 12_000;
const TRUNCATION_SUFFIX: &str = "\n\n... (truncated to fit Windsurf rule limit)\n";

const LEGACY_RULES_PATH: &str = ".windsurfrules";
const LEGACY_RULES_LIMIT: usize = 6_000;
const LEGACY_TRUNCATION_SUFFIX: &str = "\n\n... (see .windsurf/rules/ for full details)\n";

/// Globs listed in the header before the rest are summarized.
const HEADER_GLOBS: usize = 5;

pub struct WindsurfConverter;

pub fn register(registry: &mut ConverterRegistry) {
    registry.register(INFO.name, Box::new(WindsurfConverter));
}

#[derive(Serialize)]
struct WorkflowHeader {
    description: String,
}

impl Converter for WindsurfConverter {
    fn info(&self) -> &TargetInfo {
        &INFO
    }

    #[instrument(skip_all, fields(target_name = INFO.name, units = tree.len()))]
    fn convert(&self, tree: &MergedKnowledgeTree) -> Result<Vec<Artifact>> {
        let root = Path::new(INFO.output_dir);
        let rules = root.join("rules");
        let mut artifacts = Vec::new();

        let mut stems = StemSet::new();
        for unit in tree.units_of(KnowledgeKind::Skill) {
            let activation = profiles::activation(unit).unwrap_or(Activation::Model);
            let stem = stems.claim(&unit.identifier, "", usize::MAX);
            artifacts.push(Artifact::text(
                rules.join(format!("{stem}.md")),
                rule(unit, activation),
            ));
        }
        for unit in tree.units_of(KnowledgeKind::Agent) {
            let stem = stems.claim(&unit.identifier, "agent", usize::MAX);
            if stem != unit.identifier {
                warn!(agent = %unit.identifier, rule = %stem, "agent rule renamed to avoid a skill rule");
            }
            artifacts.push(Artifact::text(
                rules.join(format!("{stem}.md")),
                rule(unit, Activation::Model),
            ));
        }

        for unit in tree.units_of(KnowledgeKind::Workflow) {
            let header = WorkflowHeader {
                description: profiles::description(unit),
            };
            let text = yaml_document(INFO.name, &header, &joined_body(unit))?;
            artifacts.push(Artifact::text(
                root.join("workflows").join(format!("{}.md", unit.identifier)),
                truncate_chars(&text, RULE_CHAR_LIMIT, TRUNCATION_SUFFIX),
            ));
        }

        if let Some(instructions) = project_instructions(tree) {
            let text = format!("# Project Rules for Windsurf\n\n{instructions}");
            artifacts.push(Artifact::text(
                LEGACY_RULES_PATH,
                truncate_chars(&text, LEGACY_RULES_LIMIT, LEGACY_TRUNCATION_SUFFIX),
            ));
        }

        artifacts.extend(mcp_artifact(tree, ".windsurf/mcp_config.json", SERVERS_KEY)?);
        Ok(artifacts)
    }
}

fn rule(unit: &KnowledgeUnit, activation: Activation) -> String {
    let globs = profiles::globs(unit);
    let text = format!(
        "{}{}",
        rule_header(
            &profiles::display_name(unit),
            activation,
            &profiles::description(unit),
            &globs
        ),
        joined_body(unit)
    );
    truncate_chars(&text, RULE_CHAR_LIMIT, TRUNCATION_SUFFIX)
}

/// ```text
/// # Name
///
/// **Activation:** Always On
/// **Description:** ...
///
/// ---
///
/// ```
fn rule_header(name: &str, activation: Activation, description: &str, globs: &[String]) -> String {
    let mut lines = vec![format!("# {name}"), String::new()];

    let mode = match activation {
        Activation::Always => "Always On".to_string(),
        Activation::Glob if !globs.is_empty() => {
            let mut shown = globs
                .iter()
                .take(HEADER_GLOBS)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            if globs.len() > HEADER_GLOBS {
                shown.push_str(&format!(" (+{} more)", globs.len() - HEADER_GLOBS));
            }
            format!("Glob: `{shown}`")
        }
        Activation::Model => "Model Decision".to_string(),
        _ => "Manual (@mention)".to_string(),
    };
    lines.push(format!("**Activation:** {mode}"));

    if !description.is_empty() {
        lines.push(format!("**Description:** {description}"));
    }
    lines.extend([String::new(), "---".to_string(), String::new(), String::new()]);
    lines.join("\n")
}
