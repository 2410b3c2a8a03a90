//! Repository snapshot acquisition for the local-history strategy

use crate::domain::RepoSlug;
use anyhow::Result;
use std::path::Path;

pub mod github;
pub mod snapshot;

pub use snapshot::{install_interrupt_handler, SnapshotHandle};

/// Clone `clone_url` into a fresh run-scoped directory.
///
/// The handle owns the directory from the moment it exists, so a clone that
/// fails partway still leaves nothing behind.
pub fn acquire_snapshot(
    repo: &RepoSlug,
    clone_url: &str,
    parent: Option<&Path>,
    depth: Option<u32>,
) -> Result<SnapshotHandle> {
    let handle = SnapshotHandle::create(repo, parent)?;
    tracing::info!("Cloning {} into {}", clone_url, handle.path().display());
    github::clone_history(clone_url, handle.path(), depth)?;
    Ok(handle)
}
