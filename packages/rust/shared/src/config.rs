//! Application configuration and the persisted source registry.
//!
//! User config lives at `~/.agent-bridge/agent-bridge.toml`; the directory can
//! be relocated with `AGENT_BRIDGE_HOME`. Remote sources are checked out under
//! `<home>/cache/<name>/`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BridgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "agent-bridge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".agent-bridge";

/// Environment variable overriding the config directory.
pub const HOME_ENV_VAR: &str = "AGENT_BRIDGE_HOME";

/// Name reserved for the bundle compiled into the binary.
pub const BUILTIN_SOURCE_NAME: &str = "builtin";

/// Name reserved for the project-local knowledge tree.
pub const PROJECT_SOURCE_NAME: &str = "project";

// ---------------------------------------------------------------------------
// Config structs (matching agent-bridge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Registered knowledge sources.
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Project-local knowledge root, relative to the project directory.
    #[serde(default = "default_project_dir")]
    pub project_dir: String,

    /// Maximum concurrent syncs and renders.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Targets used by `render --all`. Empty means every registered target.
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            concurrency: default_concurrency(),
            targets: Vec::new(),
        }
    }
}

fn default_project_dir() -> String {
    ".agent".into()
}
fn default_concurrency() -> u32 {
    4
}

/// `[[sources]]` entry: a registered knowledge source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Unique name; also the cache directory name.
    pub name: String,
    /// `builtin`, a git remote, or a local path.
    pub origin: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Lower value wins.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Disabled sources are neither synced nor merged.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Knowledge roots inside the checkout; each is one merge layer.
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,
    /// Last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

fn default_priority() -> u32 {
    100
}
fn default_true() -> bool {
    true
}
fn default_roots() -> Vec<String> {
    vec![".agent".into()]
}

impl SourceRecord {
    /// A new record with default priority and roots.
    pub fn new(name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
            description: String::new(),
            priority: default_priority(),
            enabled: true,
            roots: default_roots(),
            last_synced: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Parse the origin string.
    pub fn parsed_origin(&self) -> Result<SourceOrigin> {
        SourceOrigin::parse(&self.origin)
    }
}

// ---------------------------------------------------------------------------
// Source origins
// ---------------------------------------------------------------------------

/// Location descriptor of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// The bundle compiled into the binary.
    Builtin,
    /// A git remote (https, ssh, git, or scp-like `git@host:path`).
    Remote(String),
    /// A directory on the local filesystem.
    Local(PathBuf),
}

impl SourceOrigin {
    /// Classify an origin string.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BridgeError::validation("source origin must not be empty"));
        }
        if raw == BUILTIN_SOURCE_NAME {
            return Ok(Self::Builtin);
        }
        if ["http://", "https://", "ssh://", "git://"]
            .iter()
            .any(|scheme| raw.starts_with(scheme))
        {
            let url = Url::parse(raw)
                .map_err(|e| BridgeError::validation(format!("invalid remote URL '{raw}': {e}")))?;
            return Ok(Self::Remote(url.to_string()));
        }
        if raw.starts_with("git@") {
            if !raw.contains(':') {
                return Err(BridgeError::validation(format!(
                    "invalid scp-style remote '{raw}': expected git@host:path"
                )));
            }
            return Ok(Self::Remote(raw.to_string()));
        }
        Ok(Self::Local(expand_home(raw)))
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Remote(_) => "remote",
            Self::Local(_) => "local",
        }
    }
}

impl std::fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => f.write_str(BUILTIN_SOURCE_NAME),
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Check a source name: it doubles as a directory name.
pub fn validate_source_name(name: &str) -> Result<()> {
    static NAME_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

    if name == BUILTIN_SOURCE_NAME || name == PROJECT_SOURCE_NAME {
        return Err(BridgeError::validation(format!(
            "'{name}' is reserved and cannot name a registered source"
        )));
    }
    if !NAME_RE.is_match(name) || name.len() > 64 {
        return Err(BridgeError::validation(format!(
            "invalid source name '{name}': use letters, digits, '.', '_' or '-' (max 64)"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Source registry operations
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Register a new source. Names are unique.
    pub fn add_source(&mut self, record: SourceRecord) -> Result<()> {
        validate_source_name(&record.name)?;
        SourceOrigin::parse(&record.origin)?;
        if self.get_source(&record.name).is_some() {
            return Err(BridgeError::validation(format!(
                "source '{}' already exists",
                record.name
            )));
        }
        self.sources.push(record);
        Ok(())
    }

    /// Unregister a source, returning its record.
    pub fn remove_source(&mut self, name: &str) -> Result<SourceRecord> {
        let pos = self
            .sources
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| BridgeError::not_found(format!("source '{name}'")))?;
        Ok(self.sources.remove(pos))
    }

    /// Check every registered source as `add_source` would.
    /// Hand-edited files can hold anything.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for record in &self.sources {
            validate_source_name(&record.name)?;
            SourceOrigin::parse(&record.origin)?;
            if !seen.insert(record.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "source '{}' is registered more than once",
                    record.name
                )));
            }
        }
        Ok(())
    }

    pub fn get_source(&self, name: &str) -> Option<&SourceRecord> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Enabled sources ordered by (priority, name), independent of registration order.
    pub fn enabled_sources(&self) -> Vec<&SourceRecord> {
        let mut enabled: Vec<&SourceRecord> = self.sources.iter().filter(|s| s.enabled).collect();
        enabled.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        enabled
    }

    /// Record a successful sync.
    pub fn mark_synced(&mut self, name: &str, at: DateTime<Utc>) {
        if let Some(record) = self.sources.iter_mut().find(|s| s.name == name) {
            record.last_synced = Some(at);
        }
    }

    /// Effective concurrency bound (never zero).
    pub fn concurrency(&self) -> usize {
        self.defaults.concurrency.max(1) as usize
    }
}

// ---------------------------------------------------------------------------
// Home directory and config loading
// ---------------------------------------------------------------------------

/// The agent-bridge home directory: config file plus source cache.
#[derive(Debug, Clone)]
pub struct BridgeHome {
    root: PathBuf,
}

impl BridgeHome {
    /// Resolve from `AGENT_BRIDGE_HOME`, falling back to `~/.agent-bridge`.
    pub fn discover() -> Result<Self> {
        Ok(Self::at(config_dir()?))
    }

    /// Use an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Checkout location of a remote source.
    pub fn cache_dir(&self, source_name: &str) -> PathBuf {
        self.root.join("cache").join(source_name)
    }

    /// Load the config. Returns defaults if the file does not exist.
    pub fn load_config(&self) -> Result<AppConfig> {
        let path = self.config_file();
        if !path.exists() {
            tracing::debug!(?path, "config file not found, using defaults");
            return Ok(AppConfig::default());
        }
        load_config_from(&path)
    }

    /// Write the config atomically (temp file, then rename).
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| BridgeError::io(&self.root, e))?;

        let content =
            toml::to_string_pretty(config).map_err(|e| BridgeError::config(e.to_string()))?;
        let path = self.config_file();
        let temp = self.root.join(format!(".{CONFIG_FILE_NAME}.tmp"));

        std::fs::write(&temp, content).map_err(|e| BridgeError::io(&temp, e))?;
        std::fs::rename(&temp, &path).map_err(|e| BridgeError::io(&path, e))?;
        tracing::debug!(?path, sources = config.sources.len(), "saved config");
        Ok(())
    }

    /// Write a default config file unless one already exists.
    /// Returns the path to the file.
    pub fn init_config(&self) -> Result<PathBuf> {
        let path = self.config_file();
        if path.exists() {
            tracing::info!(?path, "config file already exists, leaving it untouched");
            return Ok(path);
        }
        self.save_config(&AppConfig::default())?;
        tracing::info!(?path, "created default config file");
        Ok(path)
    }

    /// Delete the cached checkout of a source, if any.
    pub fn remove_cache(&self, source_name: &str) -> Result<bool> {
        let dir = self.cache_dir(source_name);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| BridgeError::io(&dir, e))?;
        tracing::info!(?dir, "removed source cache");
        Ok(true)
    }
}

/// Get the path to the config directory (`$AGENT_BRIDGE_HOME` or `~/.agent-bridge/`).
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| BridgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Load the application config from the discovered home directory.
pub fn load_config() -> Result<AppConfig> {
    BridgeHome::discover()?.load_config()
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BridgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| BridgeError::config(format!("failed to parse {}: {e}", path.display())))?;
    config
        .validate()
        .map_err(|e| BridgeError::config(format!("invalid {}: {e}", path.display())))?;
    Ok(config)
}
