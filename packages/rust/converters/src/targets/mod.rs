//! Concrete converters, one module per target, plus helpers they share.

pub mod canonical;
pub mod copilot;
pub mod cursor;
pub mod kiro;
pub mod opencode;
pub mod windsurf;

use std::collections::BTreeSet;
use std::path::Path;

use agentbridge_markdown::join_segments;
use agentbridge_shared::{BridgeError, KnowledgeKind, KnowledgeUnit, MergedKnowledgeTree, Result};
use serde::Serialize;

use crate::converter::Artifact;
use crate::profiles::{self, Activation};
use crate::registry::Registrar;
use crate::tool_config;

/// Registration functions for every built-in target.
pub const REGISTRARS: &[Registrar] = &[
    canonical::register,
    copilot::register,
    cursor::register,
    kiro::register,
    opencode::register,
    windsurf::register,
];

/// Every segment of a unit as one text, related segments behind delimiters.
pub(crate) fn joined_body(unit: &KnowledgeUnit) -> String {
    join_segments(
        unit.segments
            .iter()
            .map(|s| (s.name.as_str(), s.body.as_str())),
    )
}

/// `---` fenced YAML header from a serializable struct, a blank line, then `body`.
pub(crate) fn yaml_document<T: Serialize>(target: &str, header: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(header)
        .map_err(|e| BridgeError::render(target, format!("header serialization failed: {e}")))?;
    Ok(format!("---\n{yaml}---\n\n{body}"))
}

/// `name` + `description` header used for skill documents.
#[derive(Serialize)]
pub(crate) struct SkillHeader {
    pub name: String,
    pub description: String,
}

/// The primary document at `dir/primary_name` followed by each related
/// segment as a sibling file under `dir`, keeping its relative name.
pub(crate) fn bundle_artifacts(
    dir: &Path,
    primary_name: &str,
    primary_text: String,
    unit: &KnowledgeUnit,
) -> Vec<Artifact> {
    let mut artifacts = vec![Artifact::text(dir.join(primary_name), primary_text)];
    artifacts.extend(
        unit.related()
            .iter()
            .map(|s| Artifact::text(dir.join(&s.name), s.body.clone())),
    );
    artifacts
}

/// The tool config reshaped with its server map under `key`, if any servers exist.
pub(crate) fn mcp_artifact(
    tree: &MergedKnowledgeTree,
    path: &str,
    key: &str,
) -> Result<Option<Artifact>> {
    match tree
        .tool_config()
        .and_then(|config| tool_config::with_servers_key(config, key))
    {
        Some(value) => Ok(Some(Artifact::json(path, &value)?)),
        None => Ok(None),
    }
}

/// File or directory stems already used within one output directory.
///
/// Identifiers are only unique per kind, and some targets fold kinds into
/// one directory or normalize names, so two units can ask for the same stem.
/// Claims are first come, first served in tree order.
#[derive(Debug, Default)]
pub(crate) struct StemSet {
    taken: BTreeSet<String>,
}

impl StemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `preferred` when free; otherwise `<prefix>-<preferred>` (if a prefix
    /// is given), then `<preferred>-2`, `<preferred>-3`, ... Results never
    /// exceed `max_len` characters.
    pub fn claim(&mut self, preferred: &str, prefix: &str, max_len: usize) -> String {
        let mut candidates = vec![fit(preferred, "", max_len)];
        if !prefix.is_empty() {
            candidates.push(fit(&format!("{prefix}-{preferred}"), "", max_len));
        }
        for candidate in candidates {
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
        let mut n = 2usize;
        loop {
            let candidate = fit(preferred, &format!("-{n}"), max_len);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// `base` cut so that `base + suffix` fits in `max_len` characters.
fn fit(base: &str, suffix: &str, max_len: usize) -> String {
    let room = max_len.saturating_sub(suffix.chars().count());
    let cut: String = base.chars().take(room).collect();
    let cut = cut.trim_end_matches('-');
    format!("{cut}{suffix}")
}

/// Project-wide instructions drawn from the merged tree: the primary text
/// of every always-on skill, then an index of agents and workflows.
///
/// `None` when the tree has no units.
pub(crate) fn project_instructions(tree: &MergedKnowledgeTree) -> Option<String> {
    if tree.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = tree
        .units_of(KnowledgeKind::Skill)
        .filter(|unit| profiles::activation(unit) == Some(Activation::Always))
        .map(|unit| unit.body().trim().to_string())
        .filter(|body| !body.is_empty())
        .collect();

    for (kind, heading) in [
        (KnowledgeKind::Agent, "## Agents"),
        (KnowledgeKind::Workflow, "## Workflows"),
    ] {
        let entries: Vec<String> = tree
            .units_of(kind)
            .map(|unit| {
                format!(
                    "- **{}** (`{}`): {}",
                    profiles::display_name(unit),
                    unit.identifier,
                    profiles::description(unit)
                )
            })
            .collect();
        if !entries.is_empty() {
            parts.push(format!("{heading}\n\n{}", entries.join("\n")));
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(format!("{}\n", parts.join("\n\n")))
}
