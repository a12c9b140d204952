//! Installation status: sources, rendered targets, and the merged tree.

use std::path::{Path, PathBuf};

use agentbridge_converters::{read_manifest, registry, tool_config};
use agentbridge_shared::{
    AppConfig, BUILTIN_SOURCE_NAME, BridgeHome, KnowledgeKind, Result, SourceOrigin, Warning,
};
use agentbridge_sources::BUILTIN_BUNDLE_VERSION;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::pipeline::{self, SilentProgress};

#[derive(Debug, Clone, Serialize)]
pub struct SourceState {
    pub name: String,
    /// `builtin`, `remote`, or `local`.
    pub origin_kind: String,
    pub origin: String,
    pub priority: Option<u32>,
    pub enabled: bool,
    /// Whether the snapshot is available on disk.
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetState {
    pub target: String,
    pub display_name: String,
    pub output_dir: String,
    /// Whether a manifest exists under the destination.
    pub rendered: bool,
    pub files: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitCounts {
    pub agents: usize,
    pub skills: usize,
    pub workflows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub bundle_version: String,
    pub config_file: PathBuf,
    pub project_dir: PathBuf,
    pub sources: Vec<SourceState>,
    pub targets: Vec<TargetState>,
    pub units: UnitCounts,
    pub mcp_servers: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Collect status for a project rooted at `project_root`, with targets
/// rendered under `dest`.
#[instrument(skip_all, fields(project = %project_root.display()))]
pub fn collect_status(
    config: &AppConfig,
    home: &BridgeHome,
    project_root: &Path,
    dest: &Path,
) -> Result<StatusReport> {
    let mut sources = vec![SourceState {
        name: BUILTIN_SOURCE_NAME.to_string(),
        origin_kind: SourceOrigin::Builtin.kind_label().to_string(),
        origin: format!("bundle v{BUILTIN_BUNDLE_VERSION}"),
        priority: None,
        enabled: true,
        present: true,
        last_synced: None,
    }];
    for record in &config.sources {
        let (origin_kind, present) = match record.parsed_origin() {
            Ok(SourceOrigin::Builtin) => ("builtin", true),
            Ok(SourceOrigin::Remote(_)) => ("remote", home.cache_dir(&record.name).join(".git").exists()),
            Ok(SourceOrigin::Local(path)) => ("local", path.is_dir()),
            Err(_) => ("invalid", false),
        };
        sources.push(SourceState {
            name: record.name.clone(),
            origin_kind: origin_kind.to_string(),
            origin: record.origin.clone(),
            priority: Some(record.priority),
            enabled: record.enabled,
            present,
            last_synced: record.last_synced,
        });
    }

    let mut targets = Vec::new();
    for info in registry().infos() {
        let manifest = read_manifest(dest, info.name)?;
        targets.push(TargetState {
            target: info.name.to_string(),
            display_name: info.display_name.to_string(),
            output_dir: info.output_dir.to_string(),
            rendered: manifest.is_some(),
            files: manifest.map(|m| m.files.len()).unwrap_or(0),
        });
    }

    let built = pipeline::build_tree(config, home, project_root, &SilentProgress)?;
    let units = UnitCounts {
        agents: built.tree.count(KnowledgeKind::Agent),
        skills: built.tree.count(KnowledgeKind::Skill),
        workflows: built.tree.count(KnowledgeKind::Workflow),
    };
    let mcp_servers = built
        .tree
        .tool_config()
        .map(tool_config::server_names)
        .unwrap_or_default();

    Ok(StatusReport {
        bundle_version: BUILTIN_BUNDLE_VERSION.to_string(),
        config_file: home.config_file(),
        project_dir: pipeline::project_dir(config, project_root),
        sources,
        targets,
        units,
        mcp_servers,
        warnings: built.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentbridge_shared::SourceRecord;

    #[test]
    fn status_of_fresh_installation() {
        let tmp = std::env::temp_dir().join(format!("ab-status-{}", uuid::Uuid::now_v7()));
        let home = BridgeHome::at(tmp.join("home"));
        let mut config = AppConfig::default();
        config
            .add_source(SourceRecord::new("missing", tmp.join("nowhere").to_string_lossy()))
            .expect("add");

        let status = collect_status(&config, &home, &tmp, &tmp).expect("status");

        assert_eq!(status.sources.len(), 2);
        assert_eq!(status.sources[0].name, "builtin");
        assert_eq!(status.sources[1].origin_kind, "local");
        assert!(!status.sources[1].present);

        assert!(status.targets.iter().all(|t| !t.rendered));
        assert_eq!(status.targets.len(), registry().len());

        assert_eq!(status.units.agents, 1);
        assert_eq!(status.units.skills, 1);
        assert_eq!(status.units.workflows, 1);
        assert!(status.mcp_servers.is_empty());
        assert_eq!(status.warnings.len(), 1);

        let json = serde_json::to_value(&status).expect("json");
        assert_eq!(json["units"]["skills"], 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
