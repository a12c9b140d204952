//! Canonical knowledge model shared by sources, the merger, and converters.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{BridgeError, Result};

// ---------------------------------------------------------------------------
// KnowledgeKind
// ---------------------------------------------------------------------------

/// The kind of a knowledge unit.
///
/// Declaration order is the tree's key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    Agent,
    Skill,
    Workflow,
    ToolConfig,
}

impl KnowledgeKind {
    /// Kinds stored as units in a tree (tool config is a separate payload).
    pub const UNIT_KINDS: [KnowledgeKind; 3] = [Self::Agent, Self::Skill, Self::Workflow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Skill => "skill",
            Self::Workflow => "workflow",
            Self::ToolConfig => "tool_config",
        }
    }

    /// Directory holding this kind inside a knowledge root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Skill => "skills",
            Self::Workflow => "workflows",
            Self::ToolConfig => "",
        }
    }

    /// Conventional primary file name inside a bundle directory.
    pub fn primary_file_name(&self) -> Option<&'static str> {
        match self {
            Self::Agent => Some("AGENT.md"),
            Self::Skill => Some("SKILL.md"),
            Self::Workflow => Some("WORKFLOW.md"),
            Self::ToolConfig => None,
        }
    }
}

impl std::fmt::Display for KnowledgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// A metadata value: a scalar or a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<MetaValue>),
}

impl MetaValue {
    /// The value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a bool. Accepts `true`/`false` text as well.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Flatten into a list of display strings.
    ///
    /// A scalar yields a single element; a comma-separated text value is split.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().map(|v| v.to_string()).collect(),
            Self::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<&str>> for MetaValue {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(MetaValue::from).collect())
    }
}

/// Insertion-ordered mapping of metadata keys to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text value for `key`, if present and textual.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Metadata::new();
        for (k, v) in iter {
            meta.insert(k, v);
        }
        meta
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// KnowledgeUnit
// ---------------------------------------------------------------------------

/// One physical document contributing to a knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Path relative to the unit (e.g. `SKILL.md`, `examples/basic.md`).
    pub name: String,
    /// Provenance tag: `<source>:<path relative to the knowledge root>`.
    pub origin: String,
    /// Raw text. For the primary segment, frontmatter is already stripped.
    pub body: String,
}

/// Key of a unit within a tree. Orders by kind, then identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitKey {
    pub kind: KnowledgeKind,
    pub identifier: String,
}

impl UnitKey {
    pub fn new(kind: KnowledgeKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.identifier)
    }
}

/// The atomic piece of distributable knowledge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeUnit {
    pub kind: KnowledgeKind,
    pub identifier: String,
    pub metadata: Metadata,
    /// Ordered segments; the first one is the primary document.
    pub segments: Vec<Segment>,
}

impl KnowledgeUnit {
    pub fn new(kind: KnowledgeKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            metadata: Metadata::new(),
            segments: Vec::new(),
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.kind, self.identifier.clone())
    }

    pub fn primary(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// Body of the primary segment, or empty.
    pub fn body(&self) -> &str {
        self.primary().map(|s| s.body.as_str()).unwrap_or("")
    }

    /// Segments after the primary one.
    pub fn related(&self) -> &[Segment] {
        self.segments.get(1..).unwrap_or(&[])
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.get_str("description")
    }
}

// ---------------------------------------------------------------------------
// KnowledgeTree
// ---------------------------------------------------------------------------

/// A snapshot of units from one layer, plus an optional tool config payload.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeTree {
    units: BTreeMap<UnitKey, KnowledgeUnit>,
    /// Opaque tool-access configuration (`mcp_config.json`).
    pub tool_config: Option<serde_json::Value>,
}

impl KnowledgeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a unit. A second unit with the same key is a construction error.
    pub fn insert(&mut self, unit: KnowledgeUnit) -> Result<()> {
        let key = unit.key();
        if self.units.contains_key(&key) {
            return Err(BridgeError::DuplicateUnit {
                kind: key.kind.to_string(),
                identifier: key.identifier,
            });
        }
        self.units.insert(key, unit);
        Ok(())
    }

    pub fn get(&self, kind: KnowledgeKind, identifier: &str) -> Option<&KnowledgeUnit> {
        self.units.get(&UnitKey::new(kind, identifier))
    }

    /// Units in key order.
    pub fn units(&self) -> impl Iterator<Item = &KnowledgeUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.tool_config.is_none()
    }
}

// ---------------------------------------------------------------------------
// MergedKnowledgeTree
// ---------------------------------------------------------------------------

/// A unit in the merged tree with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedUnit {
    pub unit: KnowledgeUnit,
    /// Source whose unit is in place.
    pub winner: String,
    /// Every source that supplied this key, in application order.
    pub contributors: Vec<String>,
}

/// Result of the overlay merge: same shape as a tree, plus provenance.
#[derive(Debug, Clone, Default)]
pub struct MergedKnowledgeTree {
    units: BTreeMap<UnitKey, MergedUnit>,
    tool_config: Option<(String, serde_json::Value)>,
}

impl MergedKnowledgeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: KnowledgeKind, identifier: &str) -> Option<&MergedUnit> {
        self.units.get(&UnitKey::new(kind, identifier))
    }

    pub fn get_mut(&mut self, key: &UnitKey) -> Option<&mut MergedUnit> {
        self.units.get_mut(key)
    }

    /// Place a unit as the winner for its key, replacing any previous unit
    /// and extending the contributor history.
    pub fn place(&mut self, unit: KnowledgeUnit, source: &str) {
        let key = unit.key();
        let mut contributors = self
            .units
            .remove(&key)
            .map(|prev| prev.contributors)
            .unwrap_or_default();
        contributors.push(source.to_string());
        self.units.insert(
            key,
            MergedUnit {
                unit,
                winner: source.to_string(),
                contributors,
            },
        );
    }

    /// Merged units in key order.
    pub fn entries(&self) -> impl Iterator<Item = &MergedUnit> {
        self.units.values()
    }

    /// Knowledge units in key order.
    pub fn units(&self) -> impl Iterator<Item = &KnowledgeUnit> {
        self.units.values().map(|m| &m.unit)
    }

    /// Units of a single kind, in identifier order.
    pub fn units_of(&self, kind: KnowledgeKind) -> impl Iterator<Item = &KnowledgeUnit> {
        self.units().filter(move |u| u.kind == kind)
    }

    pub fn count(&self, kind: KnowledgeKind) -> usize {
        self.units_of(kind).count()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.tool_config.is_none()
    }

    pub fn set_tool_config(&mut self, value: serde_json::Value, source: &str) {
        self.tool_config = Some((source.to_string(), value));
    }

    pub fn tool_config(&self) -> Option<&serde_json::Value> {
        self.tool_config.as_ref().map(|(_, v)| v)
    }

    /// Source that supplied the tool config in place.
    pub fn tool_config_source(&self) -> Option<&str> {
        self.tool_config.as_ref().map(|(s, _)| s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Category of a recoverable problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A source could not be synced or loaded; its contribution was dropped.
    Fetch,
    /// A single file or bundle was skipped.
    MalformedUnit,
    /// The tool config of a layer was unreadable.
    ToolConfig,
    /// Metadata was partially dropped.
    Metadata,
}

/// A recorded, non-fatal problem surfaced once at the end of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: None,
            path: None,
            message: message.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "[{source}] ")?;
        }
        if let Some(path) = &self.path {
            write!(f, "{}: ", path.display())?;
        }
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(id: &str) -> KnowledgeUnit {
        let mut unit = KnowledgeUnit::new(KnowledgeKind::Skill, id);
        unit.segments.push(Segment {
            name: "SKILL.md".into(),
            origin: format!("test:skills/{id}/SKILL.md"),
            body: "body".into(),
        });
        unit
    }

    #[test]
    fn tree_rejects_duplicate_key() {
        let mut tree = KnowledgeTree::new();
        tree.insert(skill("x")).expect("first insert");
        let err = tree.insert(skill("x")).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateUnit { .. }));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn tree_orders_by_kind_then_identifier() {
        let mut tree = KnowledgeTree::new();
        tree.insert(KnowledgeUnit::new(KnowledgeKind::Workflow, "a"))
            .expect("insert");
        tree.insert(skill("b")).expect("insert");
        tree.insert(skill("a")).expect("insert");
        tree.insert(KnowledgeUnit::new(KnowledgeKind::Agent, "z"))
            .expect("insert");

        let keys: Vec<String> = tree.units().map(|u| u.key().to_string()).collect();
        assert_eq!(keys, vec!["agent/z", "skill/a", "skill/b", "workflow/a"]);
    }

    #[test]
    fn metadata_keeps_insertion_order_and_replaces_in_place() {
        let mut meta = Metadata::new();
        meta.insert("description", "first");
        meta.insert("activation", "always");
        meta.insert("description", "second");

        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["description", "activation"]);
        assert_eq!(meta.get_str("description"), Some("second"));
    }

    #[test]
    fn metadata_serializes_as_ordered_map() {
        let meta: Metadata = [("zeta", MetaValue::from("z")), ("alpha", MetaValue::from(true))]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&meta).expect("serialize");
        assert_eq!(json, r#"{"zeta":"z","alpha":true}"#);
    }

    #[test]
    fn meta_value_string_list() {
        let globs = MetaValue::from(vec!["*.rs", "*.toml"]);
        assert_eq!(globs.to_string_list(), vec!["*.rs", "*.toml"]);
        let csv = MetaValue::from("a, b ,c");
        assert_eq!(csv.to_string_list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn merged_place_tracks_contributors() {
        let mut merged = MergedKnowledgeTree::new();
        merged.place(skill("x"), "builtin");
        merged.place(skill("x"), "team");

        let entry = merged.get(KnowledgeKind::Skill, "x").expect("present");
        assert_eq!(entry.winner, "team");
        assert_eq!(entry.contributors, vec!["builtin", "team"]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn warning_display() {
        let w = Warning::new(WarningKind::MalformedUnit, "invalid UTF-8")
            .with_source("team")
            .with_path("skills/bad/SKILL.md");
        assert_eq!(w.to_string(), "[team] skills/bad/SKILL.md: invalid UTF-8");
    }
}
