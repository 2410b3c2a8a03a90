//! Finds change numbers for an issue by reading commit messages.

use super::history::CommitHistory;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Merge commits created by the web UI: `Merge pull request #42 from ...`.
static MERGE_PULL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Merge pull request #(\d+)").expect("valid regex"));

/// Squash and rebase merges: `Fix crash (#42)`.
static SQUASH_PULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(#(\d+)\)").expect("valid regex"));

/// Change numbers a single commit message advertises.
pub fn change_refs_in(message: &str) -> BTreeSet<u64> {
    MERGE_PULL
        .captures_iter(message)
        .chain(SQUASH_PULL.captures_iter(message))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

pub struct ChangeReferenceScanner {
    history: CommitHistory,
}

impl ChangeReferenceScanner {
    pub fn new(history: CommitHistory) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &CommitHistory {
        &self.history
    }

    /// Candidate change numbers for `issue_number`.
    ///
    /// A commit mentioning the issue contributes the changes named in its own
    /// message and in the merge commits that introduced it. The issue's own
    /// number is never returned.
    pub fn find_references(&self, issue_number: u64) -> BTreeSet<u64> {
        let mut refs = BTreeSet::new();
        for commit in self.history.mentioning(issue_number) {
            refs.extend(change_refs_in(&commit.message));
            for merge_id in &commit.merged_via {
                if let Some(merge) = self.history.get(merge_id) {
                    refs.extend(change_refs_in(&merge.message));
                }
            }
        }
        refs.remove(&issue_number);
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::super::history::fixture::RepoFixture;
    use super::super::history::CommitEntry;
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, message: &str, merged_via: &[&str]) -> CommitEntry {
        CommitEntry {
            id: id.to_string(),
            message: message.to_string(),
            parent_count: 1,
            merged_via: merged_via.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn extracts_merge_and_squash_forms() {
        let refs = change_refs_in("Merge pull request #42 from acme/fix\n\nAlso (#43), not #44");
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec![42, 43]);
        assert!(change_refs_in("Fixes #10").is_empty());
    }

    #[test]
    fn follows_commits_to_the_merge_that_introduced_them() {
        let history = CommitHistory::from_commits(vec![
            entry("m", "Merge pull request #11 from acme/fix-10", &[]),
            entry("a", "Read key lazily\n\nFixes #10", &["m"]),
            entry("s", "Handle missing key (#14)\n\nCloses #13", &[]),
        ]);
        let scanner = ChangeReferenceScanner::new(history);
        assert_eq!(scanner.find_references(10).into_iter().collect::<Vec<_>>(), vec![11]);
        assert_eq!(scanner.find_references(13).into_iter().collect::<Vec<_>>(), vec![14]);
        assert!(scanner.find_references(99).is_empty());
    }

    #[test]
    fn never_returns_the_issue_itself() {
        let history = CommitHistory::from_commits(vec![entry("a", "Revert (#10)", &[])]);
        let scanner = ChangeReferenceScanner::new(history);
        assert!(scanner.find_references(10).is_empty());
    }

    #[test]
    fn repeated_scans_are_identical() {
        let history = CommitHistory::from_commits(vec![
            entry("a", "Fix (#21) for #20", &[]),
            entry("b", "Follow-up (#22), refs #20", &[]),
        ]);
        let scanner = ChangeReferenceScanner::new(history);
        let first = scanner.find_references(20);
        assert_eq!(first, scanner.find_references(20));
        assert_eq!(first.into_iter().collect::<Vec<_>>(), vec![21, 22]);
    }

    #[test]
    fn scans_a_real_history() {
        let tmp = TempDir::new().expect("tmp");
        let fx = RepoFixture::init(tmp.path());
        fx.mainline("Initial commit");
        fx.merged_branch(&["Read provider key lazily\n\nFixes #10"], "Merge pull request #11 from acme/fix-10");
        fx.mainline("Handle missing key (#14)\n\nCloses #13");

        let scanner = ChangeReferenceScanner::new(CommitHistory::load(tmp.path()).expect("load"));
        assert_eq!(scanner.find_references(10).into_iter().collect::<Vec<_>>(), vec![11]);
        assert_eq!(scanner.find_references(13).into_iter().collect::<Vec<_>>(), vec![14]);
    }
}
