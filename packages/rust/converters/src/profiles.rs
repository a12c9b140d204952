//! Metadata lookups with per-identifier fallbacks.
//!
//! Every accessor prefers the unit's own metadata. When a key is absent, a
//! small table of well-known identifiers supplies the default, and past that a
//! generic default applies.

use agentbridge_markdown::{first_paragraph, humanize, single_line};
use agentbridge_shared::{KnowledgeUnit, MetaValue};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Skill activation
// ---------------------------------------------------------------------------

/// When a skill or rule is applied by the target tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Always,
    Glob,
    Model,
    Manual,
}

impl Activation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "always_on" | "always-on" => Some(Self::Always),
            "glob" | "auto" => Some(Self::Glob),
            "model" | "model_decision" | "model-decision" => Some(Self::Model),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

struct SkillProfile {
    id: &'static str,
    activation: Activation,
    globs: &'static [&'static str],
}

const SKILL_PROFILES: &[SkillProfile] = &[
    SkillProfile {
        id: "clean-code",
        activation: Activation::Always,
        globs: &[],
    },
    SkillProfile {
        id: "behavioral-modes",
        activation: Activation::Always,
        globs: &[],
    },
    SkillProfile {
        id: "nextjs-react-expert",
        activation: Activation::Glob,
        globs: &["**/*.tsx", "**/*.jsx", "**/next.config.*", "**/app/**/*"],
    },
    SkillProfile {
        id: "tailwind-patterns",
        activation: Activation::Glob,
        globs: &["**/*.tsx", "**/*.jsx", "**/*.css", "**/tailwind.config.*"],
    },
    SkillProfile {
        id: "python-patterns",
        activation: Activation::Glob,
        globs: &["**/*.py", "**/pyproject.toml", "**/requirements.txt"],
    },
    SkillProfile {
        id: "rust-pro",
        activation: Activation::Glob,
        globs: &["**/*.rs", "**/Cargo.toml"],
    },
    SkillProfile {
        id: "database-design",
        activation: Activation::Glob,
        globs: &["**/*.sql", "**/prisma/**/*", "**/migrations/**/*"],
    },
    SkillProfile {
        id: "testing-patterns",
        activation: Activation::Glob,
        globs: &["**/*.test.*", "**/*.spec.*", "**/__tests__/**/*"],
    },
    SkillProfile {
        id: "architecture",
        activation: Activation::Model,
        globs: &[],
    },
    SkillProfile {
        id: "systematic-debugging",
        activation: Activation::Model,
        globs: &[],
    },
    SkillProfile {
        id: "red-team-tactics",
        activation: Activation::Manual,
        globs: &[],
    },
];

fn skill_profile(id: &str) -> Option<&'static SkillProfile> {
    SKILL_PROFILES.iter().find(|p| p.id == id)
}

/// Activation of a skill: explicit `activation`, else implied by `globs`,
/// else the well-known default. `None` means the skill has no activation.
pub fn activation(unit: &KnowledgeUnit) -> Option<Activation> {
    if let Some(explicit) = unit.metadata.get_str("activation").and_then(Activation::parse) {
        return Some(explicit);
    }
    if !list(unit, "globs").is_empty() {
        return Some(Activation::Glob);
    }
    skill_profile(&unit.identifier).map(|p| p.activation)
}

/// Glob patterns for glob-activated skills.
pub fn globs(unit: &KnowledgeUnit) -> Vec<String> {
    let explicit = list(unit, "globs");
    if !explicit.is_empty() {
        return explicit;
    }
    skill_profile(&unit.identifier)
        .map(|p| p.globs.iter().map(|g| g.to_string()).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Agent capabilities
// ---------------------------------------------------------------------------

/// Generic capability names: `read`, `edit`, `search`, `execute`, `agent`, `web`.
const AGENT_TOOL_PROFILES: &[(&str, &[&str])] = &[
    ("orchestrator", &["read", "search", "agent"]),
    ("project-planner", &["read", "search", "agent"]),
    ("frontend-specialist", &["read", "edit", "search", "execute"]),
    ("backend-specialist", &["read", "edit", "search", "execute"]),
    ("test-engineer", &["read", "edit", "search", "execute"]),
    ("debugger", &["read", "edit", "search", "execute"]),
    ("documentation-writer", &["read", "edit", "search"]),
    ("security-auditor", &["read", "search"]),
    ("explorer-agent", &["read", "search"]),
    ("code-archaeologist", &["read", "search"]),
];

const DEFAULT_AGENT_TOOLS: &[&str] = &["read", "edit", "search"];

const ORCHESTRATORS: &[&str] = &["orchestrator", "project-planner"];

const HIDDEN_AGENTS: &[&str] = &["code-archaeologist"];

/// `(agent, handoff targets)` used when an agent declares no `handoffs`.
const HANDOFF_PROFILES: &[(&str, &[&str])] = &[
    ("project-planner", &["orchestrator", "security-auditor"]),
    (
        "orchestrator",
        &["frontend-specialist", "backend-specialist", "test-engineer"],
    ),
    ("explorer-agent", &["project-planner"]),
    ("security-auditor", &["backend-specialist"]),
    ("test-engineer", &["backend-specialist"]),
    ("debugger", &["backend-specialist"]),
];

/// Capability list of an agent.
pub fn agent_tools(unit: &KnowledgeUnit) -> Vec<String> {
    let explicit = list(unit, "tools");
    if !explicit.is_empty() {
        return explicit;
    }
    AGENT_TOOL_PROFILES
        .iter()
        .find(|(id, _)| *id == unit.identifier)
        .map(|(_, tools)| *tools)
        .unwrap_or(DEFAULT_AGENT_TOOLS)
        .iter()
        .map(|t| t.to_string())
        .collect()
}

/// Whether the agent may delegate to any other agent.
pub fn is_orchestrator(unit: &KnowledgeUnit) -> bool {
    match unit.metadata.get_str("mode") {
        Some(mode) => mode.eq_ignore_ascii_case("primary"),
        None => ORCHESTRATORS.contains(&unit.identifier.as_str()),
    }
}

/// Whether the agent is hidden from user-facing pickers.
pub fn is_hidden(unit: &KnowledgeUnit) -> bool {
    match unit.metadata.get("hidden").and_then(MetaValue::as_bool) {
        Some(hidden) => hidden,
        None => HIDDEN_AGENTS.contains(&unit.identifier.as_str()),
    }
}

/// A suggested transition from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handoff {
    pub label: String,
    pub agent: String,
    pub prompt: String,
    pub send: bool,
}

impl Handoff {
    fn to(agent: &str) -> Self {
        let title = humanize(agent);
        Self {
            label: format!("Hand off to {title}"),
            agent: agent.to_string(),
            prompt: format!("Continue this work as the {title} agent."),
            send: false,
        }
    }
}

/// Handoffs of an agent, from `handoffs` metadata (agent identifiers).
pub fn handoffs(unit: &KnowledgeUnit) -> Vec<Handoff> {
    let explicit = list(unit, "handoffs");
    if !explicit.is_empty() {
        return explicit.iter().map(|a| Handoff::to(a)).collect();
    }
    HANDOFF_PROFILES
        .iter()
        .find(|(id, _)| *id == unit.identifier)
        .map(|(_, targets)| targets.iter().map(|a| Handoff::to(a)).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Names and descriptions
// ---------------------------------------------------------------------------

/// `name` metadata, else the humanized identifier.
pub fn display_name(unit: &KnowledgeUnit) -> String {
    unit.metadata
        .get_str("name")
        .map(single_line)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| humanize(&unit.identifier))
}

/// `description` metadata, else the first body paragraph, else a generic line.
pub fn description(unit: &KnowledgeUnit) -> String {
    unit.description()
        .map(single_line)
        .filter(|d| !d.is_empty())
        .or_else(|| first_paragraph(unit.body()))
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                humanize(unit.kind.as_str()),
                humanize(&unit.identifier).to_lowercase()
            )
        })
}

fn list(unit: &KnowledgeUnit, key: &str) -> Vec<String> {
    unit.metadata
        .get(key)
        .map(MetaValue::to_string_list)
        .unwrap_or_default()
}
