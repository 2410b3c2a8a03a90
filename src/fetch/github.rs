//! Cloning the target repository into a snapshot directory

use anyhow::{Context, Result};
use git2::{FetchOptions, Repository};
use std::path::Path;

/// Clone `url` into `dest` as a bare repository.
///
/// With `depth`, a shallow clone is tried first and a full clone is the fallback.
pub fn clone_history(url: &str, dest: &Path, depth: Option<u32>) -> Result<Repository> {
    let normalized = normalize_github_url(url);
    let url = normalized.as_str();

    match depth {
        Some(depth) => shallow_clone(url, dest, depth).or_else(|err| {
            tracing::warn!("Shallow clone failed ({err:#}); falling back to a full clone");
            clean_directory(dest)?;
            full_clone(url, dest)
        }),
        None => full_clone(url, dest),
    }
}

/// Normalize a GitHub URL to the canonical HTTPS `.git` form.
///
/// Examples:
/// - `https://github.com/owner/repo`    → `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo/`   → `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo.git`→ unchanged
/// - non-GitHub URLs and local paths     → unchanged
fn normalize_github_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.contains("github.com") && !trimmed.ends_with(".git") {
        format!("{}.git", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn full_clone(url: &str, dest: &Path) -> Result<Repository> {
    let mut builder = git2::build::RepoBuilder::new();
    builder.bare(true);
    builder.clone(url, dest).with_context(|| format!("Failed cloning repository from {url}"))
}

fn shallow_clone(url: &str, dest: &Path, depth: u32) -> Result<Repository> {
    let mut fo = FetchOptions::new();
    fo.depth(i32::try_from(depth).unwrap_or(i32::MAX));

    let mut builder = git2::build::RepoBuilder::new();
    builder.bare(true);
    builder.fetch_options(fo);

    builder.clone(url, dest).with_context(|| format!("Shallow clone from {url} failed"))
}

/// Empty `dir` without removing it, so a retry can clone into the same place.
fn clean_directory(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalizes_github_urls() {
        assert_eq!(normalize_github_url("https://github.com/acme/widgets"), "https://github.com/acme/widgets.git");
        assert_eq!(normalize_github_url("https://github.com/acme/widgets/"), "https://github.com/acme/widgets.git");
        assert_eq!(normalize_github_url("https://github.com/acme/widgets.git"), "https://github.com/acme/widgets.git");
        assert_eq!(normalize_github_url("/srv/git/widgets"), "/srv/git/widgets");
    }

    #[test]
    fn clones_a_local_repository_bare() {
        let source = TempDir::new().expect("source");
        let repo = Repository::init(source.path()).expect("init");
        let sig = git2::Signature::now("Dev", "dev@example.com").expect("sig");
        let tree_id = repo.index().and_then(|mut i| i.write_tree()).expect("tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[]).expect("commit");

        let dest = TempDir::new().expect("dest");
        let cloned = clone_history(source.path().to_str().expect("utf8"), dest.path(), None).expect("clone");
        assert!(cloned.is_bare());
        assert!(cloned.head().is_ok());
    }

    #[test]
    fn missing_source_is_an_error() {
        let dest = TempDir::new().expect("dest");
        let missing = dest.path().join("does-not-exist");
        let target = dest.path().join("clone");
        std::fs::create_dir_all(&target).expect("mkdir");
        assert!(clone_history(missing.to_str().expect("utf8"), &target, None).is_err());
    }
}
