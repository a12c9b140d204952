//! Overlay merge of ordered knowledge layers.
//!
//! Layers are applied lowest precedence first: the built-in bundle, then
//! registered sources from the highest `priority` number down to the lowest,
//! then the project-local tree. Per `(kind, identifier)`:
//!
//! - a unit from a different source than the one in place replaces it whole;
//! - a unit from the same source (another root of that source) contributes
//!   its not-yet-seen segments, appended in first-seen order;
//! - the tool config is last-writer-wins on the whole payload.

use std::collections::HashMap;

pub use agentbridge_shared::PROJECT_SOURCE_NAME;
use agentbridge_shared::{KnowledgeTree, MergedKnowledgeTree, UnitKey};
use tracing::{debug, instrument};

/// One source's loaded layers, in root order.
#[derive(Debug, Clone, Default)]
pub struct SourceLayers {
    pub name: String,
    pub priority: u32,
    pub layers: Vec<KnowledgeTree>,
}

impl SourceLayers {
    pub fn new(name: impl Into<String>, priority: u32, layers: Vec<KnowledgeTree>) -> Self {
        Self {
            name: name.into(),
            priority,
            layers,
        }
    }
}

/// Sort sources into application order.
///
/// Higher `priority` numbers go first so lower numbers are applied later and
/// win. Equal priorities fall back to name, with the lexicographically
/// smaller name applied last. The result does not depend on input order.
pub fn application_order(sources: &mut [SourceLayers]) {
    sources.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.name.cmp(&a.name))
    });
}

/// Merge the built-in layers, the registered sources, and the project tree.
#[instrument(skip_all, fields(sources = sources.len()))]
pub fn merge(
    builtin: &SourceLayers,
    sources: &[SourceLayers],
    project: &KnowledgeTree,
) -> MergedKnowledgeTree {
    let mut ordered = sources.to_vec();
    application_order(&mut ordered);

    let mut acc = Merge::default();
    acc.apply_source(&builtin.layers, &builtin.name);
    for source in &ordered {
        acc.apply_source(&source.layers, &source.name);
    }
    acc.apply_source(std::slice::from_ref(project), PROJECT_SOURCE_NAME);

    debug!(units = acc.tree.len(), "merged knowledge tree");
    acc.tree
}

/// Accumulator. "Same source" is decided by the position of the source in
/// application order, never by its display name.
#[derive(Default)]
struct Merge {
    tree: MergedKnowledgeTree,
    owners: HashMap<UnitKey, usize>,
    next_source: usize,
}

impl Merge {
    fn apply_source(&mut self, layers: &[KnowledgeTree], name: &str) {
        let source_id = self.next_source;
        self.next_source += 1;
        for layer in layers {
            self.apply_layer(layer, name, source_id);
        }
    }

    fn apply_layer(&mut self, layer: &KnowledgeTree, name: &str, source_id: usize) {
        for unit in layer.units() {
            let key = unit.key();
            if self.owners.get(&key) != Some(&source_id) {
                self.tree.place(unit.clone(), name);
                self.owners.insert(key, source_id);
                continue;
            }

            if let Some(existing) = self.tree.get_mut(&key) {
                for segment in &unit.segments {
                    let seen = existing
                        .unit
                        .segments
                        .iter()
                        .any(|s| s.name == segment.name);
                    if !seen {
                        existing.unit.segments.push(segment.clone());
                    }
                }
                debug!(%key, source = name, "appended segments from same source");
            }
        }

        if let Some(config) = &layer.tool_config {
            self.tree.set_tool_config(config.clone(), name);
        }
    }
}
