//! End-to-end pipeline tests against real directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentbridge_core::{
    Outcome, PROJECT_SOURCE_NAME, RunReport, SilentProgress, SourceStatus, TargetResult,
    all_targets, build_tree, remove_targets, render_targets, sync_sources,
};
use agentbridge_shared::{
    AppConfig, BridgeError, BridgeHome, KnowledgeKind, SourceRecord, WarningKind,
};

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ab-{label}-{}", uuid::Uuid::now_v7()))
}

fn write(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, text).expect("write");
}

/// A local source at `<tmp>/<name>` whose `.agent` root defines skill `x`.
fn local_source(tmp: &Path, name: &str, priority: u32, body: &str) -> SourceRecord {
    let dir = tmp.join(name);
    write(
        &dir.join(".agent/skills/x/SKILL.md"),
        &format!("---\ndescription: from {name}\n---\n\n{body}"),
    );
    SourceRecord::new(name, dir.to_string_lossy()).with_priority(priority)
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).expect("under base").to_path_buf();
                out.insert(rel, std::fs::read(&path).expect("read"));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

#[test]
fn priority_decides_regardless_of_registration_order() {
    let tmp = temp_dir("precedence");
    let home = BridgeHome::at(tmp.join("home"));
    let a = local_source(&tmp, "a", 1, "body a");
    let b = local_source(&tmp, "b", 2, "body b");

    for order in [vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]] {
        let mut config = AppConfig::default();
        for record in order {
            config.add_source(record).expect("add");
        }
        let built = build_tree(&config, &home, &tmp.join("project"), &SilentProgress)
            .expect("build");
        let entry = built.tree.get(KnowledgeKind::Skill, "x").expect("x");
        assert_eq!(entry.unit.body(), "body a");
        assert_eq!(entry.winner, "a");
        assert_eq!(entry.contributors, vec!["b", "a"]);
        assert!(built.warnings.is_empty(), "{:?}", built.warnings);
    }

    // A project-local unit overrides both.
    write(&tmp.join("project/.agent/skills/x.md"), "body local");
    let mut config = AppConfig::default();
    config.add_source(a).expect("add");
    config.add_source(b).expect("add");
    let built = build_tree(&config, &home, &tmp.join("project"), &SilentProgress).expect("build");
    let entry = built.tree.get(KnowledgeKind::Skill, "x").expect("x");
    assert_eq!(entry.unit.body(), "body local");
    assert_eq!(entry.winner, PROJECT_SOURCE_NAME);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn unreachable_source_is_dropped_with_one_warning() {
    let tmp = temp_dir("failsoft");
    let home = BridgeHome::at(tmp.join("home"));

    write(&tmp.join("one/.agent/agents/reviewer.md"), "Review code.\n");
    write(&tmp.join("two/.agent/workflows/release.md"), "Ship it.\n");
    write(&tmp.join("project/.agent/skills/local-style.md"), "House style.\n");

    let mut config = AppConfig::default();
    config
        .add_source(SourceRecord::new("one", tmp.join("one").to_string_lossy()))
        .expect("add");
    config
        .add_source(SourceRecord::new("two", tmp.join("two").to_string_lossy()))
        .expect("add");
    config
        .add_source(SourceRecord::new("gone", tmp.join("gone").to_string_lossy()))
        .expect("add");

    let built = build_tree(&config, &home, &tmp.join("project"), &SilentProgress).expect("build");

    assert_eq!(built.warnings.len(), 1);
    assert_eq!(built.warnings[0].kind, WarningKind::Fetch);
    assert_eq!(built.warnings[0].source.as_deref(), Some("gone"));

    let tree = &built.tree;
    assert!(tree.get(KnowledgeKind::Agent, "reviewer").is_some());
    assert!(tree.get(KnowledgeKind::Workflow, "release").is_some());
    assert!(tree.get(KnowledgeKind::Skill, "local-style").is_some());
    assert!(tree.get(KnowledgeKind::Skill, "clean-code").is_some());
    assert_eq!(
        RunReport::with_warnings(built.warnings).outcome(),
        Outcome::SucceededWithWarnings
    );

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn bundle_yields_three_ordered_segments() {
    let tmp = temp_dir("bundle");
    let home = BridgeHome::at(tmp.join("home"));

    // Written out of name order on purpose.
    write(&tmp.join("project/.agent/skills/api/zeta.md"), "zeta\n");
    write(&tmp.join("project/.agent/skills/api/SKILL.md"), "primary\n");
    write(&tmp.join("project/.agent/skills/api/alpha.md"), "alpha\n");

    let built = build_tree(&AppConfig::default(), &home, &tmp.join("project"), &SilentProgress)
        .expect("build");
    let unit = &built.tree.get(KnowledgeKind::Skill, "api").expect("api").unit;
    let names: Vec<&str> = unit.segments.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["SKILL.md", "alpha.md", "zeta.md"]);
    assert_eq!(unit.segments[0].origin, "project:skills/api/SKILL.md");

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn project_duplicate_is_fatal() {
    let tmp = temp_dir("duplicate");
    let home = BridgeHome::at(tmp.join("home"));
    write(&tmp.join("project/.agent/skills/x.md"), "single\n");
    write(&tmp.join("project/.agent/skills/x/SKILL.md"), "bundle\n");

    let err = build_tree(&AppConfig::default(), &home, &tmp.join("project"), &SilentProgress)
        .err()
        .expect("duplicate must fail");
    assert!(matches!(err, BridgeError::DuplicateUnit { .. }));
    assert!(err.is_defect());

    let _ = std::fs::remove_dir_all(&tmp);
}

#[tokio::test]
async fn unwritable_target_does_not_block_others() {
    let tmp = temp_dir("disjoint");
    let home = BridgeHome::at(tmp.join("home"));
    let dest = tmp.join("dest");
    // A plain file where cursor needs its directory.
    write(&dest.join(".cursor"), "not a directory");

    let built = build_tree(&AppConfig::default(), &home, &tmp.join("project"), &SilentProgress)
        .expect("build");
    let outcomes = render_targets(
        Arc::new(built.tree),
        &["cursor".to_string(), "copilot".to_string()],
        &dest,
        2,
        &SilentProgress,
    )
    .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_failed());
    assert!(!outcomes[1].is_failed());
    assert!(dest.join(".github/agents/orchestrator.md").is_file());
    assert!(dest.join(".github/skills/clean-code/SKILL.md").is_file());
    assert!(dest.join(".github/prompts/plan.prompt.md").is_file());

    let report = RunReport {
        targets: outcomes,
        ..RunReport::default()
    };
    assert_eq!(report.outcome(), Outcome::Failed);
    assert_eq!(report.outcome().exit_code(), 1);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[tokio::test]
async fn rendering_twice_is_byte_identical() {
    let tmp = temp_dir("idempotent");
    let home = BridgeHome::at(tmp.join("home"));
    let dest = tmp.join("dest");
    write(&tmp.join("project/.agent/skills/api/SKILL.md"), "---\nactivation: model\n---\n\nprimary\n");
    write(&tmp.join("project/.agent/skills/api/ref.md"), "reference\n");
    write(
        &tmp.join("project/.agent/mcp_config.json"),
        r#"{"mcpServers": {"fs": {"command": "mcp-fs", "args": ["."]}}}"#,
    );

    let built = build_tree(&AppConfig::default(), &home, &tmp.join("project"), &SilentProgress)
        .expect("build");
    let tree = Arc::new(built.tree);
    let targets = all_targets();

    let first_run = render_targets(Arc::clone(&tree), &targets, &dest, 4, &SilentProgress).await;
    assert!(first_run.iter().all(|o| !o.is_failed()), "{first_run:?}");
    let first = snapshot(&dest);

    let second_run = render_targets(Arc::clone(&tree), &targets, &dest, 4, &SilentProgress).await;
    let second = snapshot(&dest);

    assert_eq!(first, second);
    for outcome in &second_run {
        match &outcome.result {
            TargetResult::Rendered { written, removed, .. } => {
                assert_eq!(*written, 0, "{} rewrote files", outcome.target);
                assert_eq!(*removed, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // Removing every target leaves nothing behind but the empty destination.
    let removed = remove_targets(&targets, &dest, &SilentProgress);
    assert!(removed.iter().all(|o| !o.is_failed()));
    assert!(snapshot(&dest).is_empty());

    let _ = std::fs::remove_dir_all(&tmp);
}

#[tokio::test]
async fn sync_keeps_going_past_an_unreachable_source() {
    let tmp = temp_dir("sync");
    let home = BridgeHome::at(tmp.join("home"));
    write(&tmp.join("one/.agent/agents/reviewer.md"), "Review code.\n");
    write(&tmp.join("two/.agent/workflows/release.md"), "Ship it.\n");

    let mut config = AppConfig::default();
    config.defaults.concurrency = 1;
    for name in ["one", "two", "gone"] {
        config
            .add_source(SourceRecord::new(name, tmp.join(name).to_string_lossy()))
            .expect("add");
    }

    let report = sync_sources(&mut config, &home, &[], &SilentProgress)
        .await
        .expect("sync");

    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::Fetch);
    assert_eq!(report.warnings[0].source.as_deref(), Some("gone"));
    let gone = report
        .sources
        .iter()
        .find(|s| s.name == "gone")
        .expect("gone reported");
    assert!(matches!(gone.status, SourceStatus::Failed { .. }));
    assert_eq!(report.outcome(), Outcome::SucceededWithWarnings);

    assert!(config.get_source("one").expect("one").last_synced.is_some());
    assert!(config.get_source("two").expect("two").last_synced.is_some());
    assert!(config.get_source("gone").expect("gone").last_synced.is_none());

    let _ = std::fs::remove_dir_all(&tmp);
}

#[tokio::test]
async fn sync_of_unknown_name_is_not_found() {
    let tmp = temp_dir("sync-unknown");
    let home = BridgeHome::at(tmp.join("home"));
    let mut config = AppConfig::default();

    let err = sync_sources(&mut config, &home, &["ghost".to_string()], &SilentProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::NotFound { .. }));

    let _ = std::fs::remove_dir_all(&tmp);
}
