//! Temporary repository snapshot with guaranteed removal

use crate::domain::RepoSlug;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot directories that still exist, so an interrupt can remove them.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    live: Mutex<BTreeSet<PathBuf>>,
}

impl SnapshotRegistry {
    fn register(&self, path: &Path) {
        if let Ok(mut live) = self.live.lock() {
            live.insert(path.to_path_buf());
        }
    }

    fn unregister(&self, path: &Path) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(path);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.live.lock().map(|live| live.contains(path)).unwrap_or(false)
    }

    /// Delete every registered directory. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let paths: Vec<PathBuf> = match self.live.lock() {
            Ok(mut live) => std::mem::take(&mut *live).into_iter().collect(),
            Err(_) => return 0,
        };
        paths.iter().filter(|p| std::fs::remove_dir_all(p).is_ok()).count()
    }
}

static LIVE_SNAPSHOTS: Lazy<SnapshotRegistry> = Lazy::new(SnapshotRegistry::default);

/// A run-scoped local copy of the target repository.
///
/// The directory is deleted when the handle drops, whichever way the run ends.
#[derive(Debug)]
pub struct SnapshotHandle {
    root_path: PathBuf,
    repo: RepoSlug,
    registry: &'static SnapshotRegistry,
}

impl SnapshotHandle {
    /// Reserve a fresh directory under `parent` (system temp dir by default).
    pub fn create(repo: &RepoSlug, parent: Option<&Path>) -> Result<Self> {
        Self::create_in(repo, parent, &LIVE_SNAPSHOTS)
    }

    fn create_in(repo: &RepoSlug, parent: Option<&Path>, registry: &'static SnapshotRegistry) -> Result<Self> {
        let root_path = build_temp_repo_dir(repo, parent);
        std::fs::create_dir_all(&root_path)
            .with_context(|| format!("Failed creating temp directory: {}", root_path.display()))?;
        registry.register(&root_path);
        Ok(Self { root_path, repo: repo.clone(), registry })
    }

    pub fn path(&self) -> &Path {
        &self.root_path
    }

    pub fn repo(&self) -> &RepoSlug {
        &self.repo
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        self.registry.unregister(&self.root_path);
        match std::fs::remove_dir_all(&self.root_path) {
            Ok(()) => tracing::debug!("Removed snapshot {}", self.root_path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!("Failed to remove snapshot {}: {}", self.root_path.display(), err)
            }
        }
    }
}

/// Delete every snapshot that has not been dropped yet. Returns how many were removed.
pub fn remove_live_snapshots() -> usize {
    LIVE_SNAPSHOTS.sweep()
}

/// Make Ctrl-C remove live snapshots before the process exits.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        let removed = remove_live_snapshots();
        eprintln!("\nInterrupted; removed {removed} temporary snapshot(s)");
        std::process::exit(130);
    })
    .context("Failed to install interrupt handler")
}

fn build_temp_repo_dir(repo: &RepoSlug, parent: Option<&Path>) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    let pid = std::process::id();
    let base = parent.map(Path::to_path_buf).unwrap_or_else(env::temp_dir);
    base.join(format!("issue-hook-{}-{pid}-{nanos}", repo.dir_name()))
}
