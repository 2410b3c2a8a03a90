//! Commit history read from a snapshot, indexed by referenced number.

use anyhow::{Context, Result};
use git2::{Oid, Repository, Sort};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// `#123` anywhere in a message.
static NUMBER_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\d+)\b").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub id: String,
    pub message: String,
    pub parent_count: usize,
    /// Merge commits that brought this commit into their first-parent line.
    pub merged_via: Vec<String>,
}

impl CommitEntry {
    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

/// Immutable view of a repository's commits, shared read-only by all workers.
#[derive(Debug, Default)]
pub struct CommitHistory {
    commits: Vec<CommitEntry>,
    by_id: HashMap<String, usize>,
    mentions: HashMap<u64, Vec<usize>>,
}

impl CommitHistory {
    pub fn from_commits(commits: Vec<CommitEntry>) -> Self {
        let mut by_id = HashMap::with_capacity(commits.len());
        let mut mentions: HashMap<u64, Vec<usize>> = HashMap::new();

        for (idx, commit) in commits.iter().enumerate() {
            by_id.insert(commit.id.clone(), idx);
            let mut numbers: Vec<u64> = referenced_numbers(&commit.message).collect();
            numbers.sort_unstable();
            numbers.dedup();
            for number in numbers {
                mentions.entry(number).or_default().push(idx);
            }
        }

        Self { commits, by_id, mentions }
    }

    /// Walk every branch of the repository at `repo_path`.
    pub fn load(repo_path: &Path) -> Result<Self> {
        let repo = Repository::open(repo_path)
            .with_context(|| format!("Failed to open repository at {}", repo_path.display()))?;

        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        if walk.push_head().is_err() {
            tracing::debug!("Snapshot has no HEAD; walking branch refs only");
        }
        walk.push_glob("heads")?;
        walk.push_glob("remotes")?;

        let mut commits = Vec::new();
        let mut index: HashMap<Oid, usize> = HashMap::new();
        let mut merges: Vec<(usize, Vec<Oid>)> = Vec::new();

        for oid in walk {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            let parents: Vec<Oid> = commit.parent_ids().collect();
            let idx = commits.len();
            if parents.len() > 1 {
                merges.push((idx, parents.clone()));
            }
            index.insert(oid, idx);
            commits.push(CommitEntry {
                id: oid.to_string(),
                message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
                parent_count: parents.len(),
                merged_via: Vec::new(),
            });
        }

        for (merge_idx, parents) in merges {
            let merge_id = commits[merge_idx].id.clone();
            for introduced in introduced_by_merge(&repo, &parents) {
                if let Some(&idx) = index.get(&introduced) {
                    commits[idx].merged_via.push(merge_id.clone());
                }
            }
        }

        tracing::info!("Indexed {} commits from {}", commits.len(), repo_path.display());
        Ok(Self::from_commits(commits))
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CommitEntry> {
        self.by_id.get(id).map(|&idx| &self.commits[idx])
    }

    /// Commits whose message contains `#number`.
    pub fn mentioning(&self, number: u64) -> impl Iterator<Item = &CommitEntry> + '_ {
        self.mentions.get(&number).into_iter().flatten().map(move |&idx| &self.commits[idx])
    }
}

fn referenced_numbers(message: &str) -> impl Iterator<Item = u64> + '_ {
    NUMBER_REF.captures_iter(message).filter_map(|caps| caps.get(1)?.as_str().parse().ok())
}

/// Commits reachable from the merged side(s) but not from the first parent.
fn introduced_by_merge(repo: &Repository, parents: &[Oid]) -> Vec<Oid> {
    let Some((first, merged)) = parents.split_first() else {
        return Vec::new();
    };
    let Ok(mut walk) = repo.revwalk() else {
        return Vec::new();
    };
    // Shallow snapshots may be missing ancestors; skip what cannot be walked.
    if walk.hide(*first).is_err() {
        return Vec::new();
    }
    for parent in merged {
        if walk.push(*parent).is_err() {
            return Vec::new();
        }
    }
    walk.filter_map(|oid| oid.ok()).collect()
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Builds small git repositories with merge and squash histories.

    use git2::{Oid, Repository, Signature};
    use std::path::Path;

    pub struct RepoFixture {
        pub repo: Repository,
    }

    impl RepoFixture {
        pub fn init(path: &Path) -> Self {
            let repo = Repository::init(path).expect("init");
            Self { repo }
        }

        fn commit(&self, update_ref: Option<&str>, message: &str, parents: &[Oid]) -> Oid {
            let sig = Signature::now("Dev", "dev@example.com").expect("sig");
            let tree_id = self.repo.index().and_then(|mut i| i.write_tree()).expect("tree");
            let tree = self.repo.find_tree(tree_id).expect("find tree");
            let parents: Vec<_> = parents.iter().map(|p| self.repo.find_commit(*p).expect("parent")).collect();
            let parent_refs: Vec<_> = parents.iter().collect();
            self.repo.commit(update_ref, &sig, &sig, message, &tree, &parent_refs).expect("commit")
        }

        /// Commit on top of HEAD (or as the root commit).
        pub fn mainline(&self, message: &str) -> Oid {
            let head = self.repo.head().ok().and_then(|h| h.target());
            let parents: Vec<Oid> = head.into_iter().collect();
            self.commit(Some("HEAD"), message, &parents)
        }

        /// Commit a side branch off HEAD, then merge it with `merge_message`.
        pub fn merged_branch(&self, branch_messages: &[&str], merge_message: &str) -> Oid {
            let base = self.repo.head().expect("head").target().expect("target");
            let mut tip = base;
            for message in branch_messages {
                tip = self.commit(None, message, &[tip]);
            }
            self.commit(Some("HEAD"), merge_message, &[base, tip])
        }
    }
}
