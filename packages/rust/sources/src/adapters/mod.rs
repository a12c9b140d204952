//! Source adapter trait and the three origin variants.
//!
//! Every adapter turns one registered source into a [`SourceSnapshot`]:
//! one [`KnowledgeTree`] layer per knowledge root it contains.

mod builtin;
mod local;
mod remote;

use std::path::{Component, Path, PathBuf};

use agentbridge_shared::{
    BridgeError, BridgeHome, KnowledgeKind, KnowledgeTree, Result, SourceOrigin, SourceRecord,
    Warning, WarningKind,
};
use tracing::warn;

use crate::loader::{self, TOOL_CONFIG_FILE};

pub use builtin::{BUILTIN_BUNDLE_VERSION, BuiltinAdapter};
pub use local::LocalAdapter;
pub use remote::RemoteAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What a `sync` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh checkout created.
    Cloned,
    /// Existing checkout fast-forwarded.
    Updated,
    /// Nothing to fetch (local or built-in origin).
    Current,
}

/// Units loaded from one source, one layer per knowledge root.
#[derive(Debug, Default)]
pub struct SourceSnapshot {
    pub source: String,
    pub layers: Vec<KnowledgeTree>,
    pub warnings: Vec<Warning>,
}

impl SourceSnapshot {
    pub fn unit_count(&self) -> usize {
        self.layers.iter().map(KnowledgeTree::len).sum()
    }
}

/// Capability shared by remote, local, and built-in sources.
///
/// Both methods block on filesystem or process I/O; async callers run them
/// on the blocking pool.
pub trait SourceAdapter: Send + Sync {
    /// Registered source name.
    fn name(&self) -> &str;

    fn origin(&self) -> SourceOrigin;

    /// Bring the local snapshot up to date. Fails with a fetch error.
    fn sync(&self) -> Result<SyncOutcome>;

    /// Read the current snapshot.
    fn load(&self) -> Result<SourceSnapshot>;

    /// Where the snapshot lives on disk, if anywhere.
    fn checkout_path(&self) -> Option<&Path>;
}

/// Build the adapter for a registered source.
pub fn adapter_for(record: &SourceRecord, home: &BridgeHome) -> Result<Box<dyn SourceAdapter>> {
    let adapter: Box<dyn SourceAdapter> = match record.parsed_origin()? {
        SourceOrigin::Builtin => Box::new(BuiltinAdapter::named(&record.name)),
        SourceOrigin::Remote(url) => Box::new(RemoteAdapter::new(
            &record.name,
            url,
            home.cache_dir(&record.name),
            record.roots.clone(),
        )),
        SourceOrigin::Local(path) => {
            Box::new(LocalAdapter::new(&record.name, path, record.roots.clone()))
        }
    };
    Ok(adapter)
}

// ---------------------------------------------------------------------------
// Shared checkout loading
// ---------------------------------------------------------------------------

/// Load every configured root under `base` as a separate layer.
pub(crate) fn load_checkout(name: &str, base: &Path, roots: &[String]) -> Result<SourceSnapshot> {
    let mut snapshot = SourceSnapshot {
        source: name.to_string(),
        ..Default::default()
    };

    for root in resolve_roots(name, base, roots, &mut snapshot.warnings)? {
        let load = loader::load_root(&root, name)?;
        snapshot.warnings.extend(load.warnings);
        for duplicate in load.duplicates {
            snapshot.warnings.push(
                Warning::new(WarningKind::MalformedUnit, duplicate.to_string())
                    .with_source(name)
                    .with_path(&root),
            );
        }
        snapshot.layers.push(load.tree);
    }

    Ok(snapshot)
}

/// Resolve configured roots to directories.
///
/// When none of them exists but `base` itself has the knowledge layout,
/// `base` is used as the single root.
fn resolve_roots(
    name: &str,
    base: &Path,
    roots: &[String],
    warnings: &mut Vec<Warning>,
) -> Result<Vec<PathBuf>> {
    if !base.is_dir() {
        return Err(BridgeError::fetch(
            name,
            format!("{} does not exist or is not a directory", base.display()),
        ));
    }

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for root in roots {
        let rel = Path::new(root);
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            let warning = Warning::new(
                WarningKind::Fetch,
                format!("root '{root}' escapes the source checkout, ignored"),
            )
            .with_source(name);
            warn!(%warning, "invalid root");
            warnings.push(warning);
            continue;
        }
        let dir = base.join(rel);
        if dir.is_dir() {
            found.push(dir);
        } else {
            missing.push(root.as_str());
        }
    }

    if found.is_empty() {
        if looks_like_root(base) {
            return Ok(vec![base.to_path_buf()]);
        }
        return Err(BridgeError::fetch(
            name,
            format!(
                "no knowledge root found under {} (looked for {})",
                base.display(),
                roots.join(", ")
            ),
        ));
    }

    for root in missing {
        let warning = Warning::new(WarningKind::Fetch, format!("root '{root}' not found"))
            .with_source(name)
            .with_path(base.join(root));
        warn!(%warning, "missing root");
        warnings.push(warning);
    }

    Ok(found)
}

fn looks_like_root(dir: &Path) -> bool {
    KnowledgeKind::UNIT_KINDS
        .iter()
        .any(|k| dir.join(k.dir_name()).is_dir())
        || dir.join(TOOL_CONFIG_FILE).is_file()
}
