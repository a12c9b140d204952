//! Git-backed source, checked out into the per-source cache directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use agentbridge_shared::{BridgeError, Result, SourceOrigin};
use tracing::{debug, info, instrument};

use super::{SourceAdapter, SourceSnapshot, SyncOutcome, load_checkout};

/// A source cloned from a git remote.
pub struct RemoteAdapter {
    name: String,
    url: String,
    checkout: PathBuf,
    roots: Vec<String>,
}

impl RemoteAdapter {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        checkout: impl Into<PathBuf>,
        roots: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            checkout: checkout.into(),
            roots,
        }
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        debug!(?args, "running git");
        let output = Command::new("git")
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| BridgeError::fetch(&self.name, format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::fetch(
                &self.name,
                format!(
                    "git {} failed ({}): {}",
                    args.first().copied().unwrap_or_default(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }
        Ok(())
    }
}

impl SourceAdapter for RemoteAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> SourceOrigin {
        SourceOrigin::Remote(self.url.clone())
    }

    /// Clone if absent, fast-forward if present.
    #[instrument(skip_all, fields(source = %self.name, url = %self.url))]
    fn sync(&self) -> Result<SyncOutcome> {
        let checkout = self.checkout.to_string_lossy().into_owned();

        if self.checkout.join(".git").exists() {
            self.git(&["-C", &checkout, "pull", "--ff-only"])?;
            info!("updated checkout");
            return Ok(SyncOutcome::Updated);
        }

        let occupied = std::fs::read_dir(&self.checkout)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if occupied {
            return Err(BridgeError::fetch(
                &self.name,
                format!(
                    "cache directory {} exists but is not a git checkout",
                    self.checkout.display()
                ),
            ));
        }

        if let Some(parent) = self.checkout.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::fetch(
                    &self.name,
                    format!("cannot create cache directory {}: {e}", parent.display()),
                )
            })?;
        }
        self.git(&["clone", "--depth", "1", &self.url, &checkout])?;
        info!(checkout = %self.checkout.display(), "cloned source");
        Ok(SyncOutcome::Cloned)
    }

    #[instrument(skip_all, fields(source = %self.name))]
    fn load(&self) -> Result<SourceSnapshot> {
        if !self.checkout.is_dir() {
            return Err(BridgeError::fetch(
                &self.name,
                "source has not been synced yet; run `agent-bridge sync`",
            ));
        }
        load_checkout(&self.name, &self.checkout, &self.roots)
    }

    fn checkout_path(&self) -> Option<&Path> {
        Some(&self.checkout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ab-remote-test-{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn load_before_sync_is_fetch_error() {
        let adapter = RemoteAdapter::new(
            "team",
            "https://example.com/kit.git",
            temp_dir().join("cache/team"),
            vec![".agent".into()],
        );
        let err = adapter.load().unwrap_err();
        assert!(err.to_string().contains("not been synced"));
    }

    #[test]
    fn unreachable_remote_is_fetch_error() {
        let tmp = temp_dir();
        let adapter = RemoteAdapter::new(
            "ghost",
            format!("file://{}/no-such-repo.git", tmp.display()),
            tmp.join("cache/ghost"),
            vec![".agent".into()],
        );
        let err = adapter.sync().unwrap_err();
        assert!(matches!(err, BridgeError::Fetch { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn uncreatable_cache_is_fetch_error() {
        let tmp = temp_dir();
        std::fs::create_dir_all(&tmp).expect("mkdir");
        // A plain file where the cache directory would go.
        std::fs::write(tmp.join("cache"), "not a directory").expect("write");

        let adapter = RemoteAdapter::new(
            "team",
            "https://example.com/kit.git",
            tmp.join("cache/team"),
            vec![".agent".into()],
        );
        let err = adapter.sync().unwrap_err();
        assert!(matches!(err, BridgeError::Fetch { ref source_name, .. } if source_name == "team"));
        assert!(err.to_string().contains("cannot create cache directory"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn occupied_cache_without_git_is_rejected() {
        let tmp = temp_dir();
        let checkout = tmp.join("cache/team");
        std::fs::create_dir_all(&checkout).expect("mkdir");
        std::fs::write(checkout.join("stray.txt"), "x").expect("write");

        let adapter = RemoteAdapter::new("team", "https://example.com/kit.git", &checkout, vec![]);
        let err = adapter.sync().unwrap_err();
        assert!(err.to_string().contains("not a git checkout"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
