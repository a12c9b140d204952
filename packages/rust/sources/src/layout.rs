//! Directory-walk step: classify the contents of a kind directory into
//! single-file units and bundle directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agentbridge_shared::{BridgeError, KnowledgeKind, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions carried along as related segments of a bundle.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mdc", "txt", "json", "yaml", "yml", "toml", "sh", "py", "js", "ts",
];

/// One unit found in a kind directory. Paths are relative to that directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutEntry {
    /// `agents/reviewer.md`
    SingleFile(PathBuf),
    /// `skills/clean-code/` with its primary document and related files.
    BundleDirectory {
        primary: PathBuf,
        related: Vec<PathBuf>,
    },
}

impl LayoutEntry {
    /// File stem for single files, directory name for bundles.
    pub fn identifier(&self) -> String {
        let name = match self {
            Self::SingleFile(path) => path.file_stem(),
            Self::BundleDirectory { primary, .. } => {
                primary.components().next().map(|c| c.as_os_str())
            }
        };
        name.map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Primary file first, then related files in path order.
    pub fn files(&self) -> Vec<&Path> {
        match self {
            Self::SingleFile(path) => vec![path.as_path()],
            Self::BundleDirectory { primary, related } => std::iter::once(primary.as_path())
                .chain(related.iter().map(PathBuf::as_path))
                .collect(),
        }
    }

    /// Directory that segment names are relative to.
    pub fn unit_dir(&self) -> PathBuf {
        match self {
            Self::SingleFile(_) => PathBuf::new(),
            Self::BundleDirectory { primary, .. } => primary
                .components()
                .next()
                .map(|c| PathBuf::from(c.as_os_str()))
                .unwrap_or_default(),
        }
    }
}

/// Result of planning a kind directory.
#[derive(Debug, Default)]
pub struct Layout {
    pub entries: Vec<LayoutEntry>,
    /// Paths that could not form a unit, with the reason.
    pub issues: Vec<(PathBuf, String)>,
}

/// Group relative file paths of one kind directory into layout entries.
///
/// Output order depends only on the paths, never on their input order.
pub fn plan_entries(kind: KnowledgeKind, files: &[PathBuf]) -> Layout {
    let mut layout = Layout::default();
    let mut bundles: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut singles: Vec<PathBuf> = Vec::new();

    for file in files {
        let mut components = file.components();
        let first = components.next().map(|c| PathBuf::from(c.as_os_str()));
        match (first, components.next()) {
            (Some(_), None) => {
                if has_extension(file, &["md", "markdown"]) {
                    singles.push(file.clone());
                } else {
                    debug!(path = %file.display(), "ignoring non-markdown file");
                }
            }
            (Some(dir), Some(_)) => bundles.entry(dir).or_default().push(file.clone()),
            (None, _) => {}
        }
    }

    singles.sort();
    layout
        .entries
        .extend(singles.into_iter().map(LayoutEntry::SingleFile));

    for (dir, mut members) in bundles {
        members.sort();
        match choose_primary(kind, &dir, &members) {
            Some(primary) => {
                let related = members
                    .into_iter()
                    .filter(|p| *p != primary && has_extension(p, TEXT_EXTENSIONS))
                    .collect();
                layout
                    .entries
                    .push(LayoutEntry::BundleDirectory { primary, related });
            }
            None => layout
                .issues
                .push((dir, "bundle directory has no markdown document".into())),
        }
    }

    layout.entries.sort_by_key(LayoutEntry::identifier);
    layout
}

/// Primary selection: conventional name, `<dir>.md`, `README.md`, then the
/// first markdown file directly inside the directory.
fn choose_primary(kind: KnowledgeKind, dir: &Path, members: &[PathBuf]) -> Option<PathBuf> {
    let direct: Vec<&PathBuf> = members
        .iter()
        .filter(|p| p.components().count() == 2 && has_extension(p, &["md", "markdown"]))
        .collect();

    let named = |name: &str| {
        direct
            .iter()
            .find(|p| {
                p.file_name()
                    .is_some_and(|f| f.to_string_lossy().eq_ignore_ascii_case(name))
            })
            .map(|p| (*p).clone())
    };

    let dir_md = format!("{}.md", dir.to_string_lossy());
    kind.primary_file_name()
        .and_then(named)
        .or_else(|| named(&dir_md))
        .or_else(|| named("README.md"))
        .or_else(|| direct.first().map(|p| (*p).clone()))
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| exts.contains(&e.as_str()))
}

/// List regular files under a kind directory, relative to it.
///
/// Hidden entries and `node_modules` are skipped. A missing directory is empty.
pub fn scan_kind_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<(PathBuf, String)>)> {
    let mut files = Vec::new();
    let mut issues = Vec::new();

    if !dir.exists() {
        return Ok((files, issues));
    }
    if !dir.is_dir() {
        return Err(BridgeError::malformed(dir, "expected a directory"));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && name != "node_modules"
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Ok(rel) = entry.path().strip_prefix(dir) {
                    files.push(rel.to_path_buf());
                }
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.into());
                issues.push((path, e.to_string()));
            }
        }
    }

    Ok((files, issues))
}

/// Render a relative path with `/` separators.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
