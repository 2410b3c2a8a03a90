//! Read-only access to the remote repository service.
//!
//! [`RepositoryService`] is the seam the resolvers and the pipeline talk to;
//! [`GitHubClient`] implements it over the GitHub REST API.

use crate::domain::Issue;

pub mod client;
pub mod types;

pub use crate::retry::RemoteError;
pub use client::GitHubClient;
pub use types::ChangeDetails;

pub trait RepositoryService: Send + Sync {
    /// Name of the repository's default branch.
    fn default_branch(&self) -> Result<String, RemoteError>;

    /// Every closed issue, pull requests excluded, following pagination.
    fn list_closed_issues(&self) -> Result<Vec<Issue>, RemoteError>;

    fn get_issue(&self, number: u64) -> Result<Issue, RemoteError>;

    /// Pull requests that cross-referenced or were connected to the issue.
    fn timeline_references(&self, issue: u64) -> Result<Vec<u64>, RemoteError>;

    /// Commits recorded as having closed the issue.
    fn closing_commits(&self, issue: u64) -> Result<Vec<String>, RemoteError>;

    /// Pull requests that contain `sha`.
    fn pulls_for_commit(&self, sha: &str) -> Result<Vec<u64>, RemoteError>;

    /// Pull requests whose text mentions `#issue`.
    fn search_pull_references(&self, issue: u64) -> Result<Vec<u64>, RemoteError>;

    /// Merge state and base branch of a pull request.
    fn get_pull(&self, number: u64) -> Result<ChangeDetails, RemoteError>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory [`RepositoryService`] for unit tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct FakeService {
        pub default_branch: String,
        pub issues: Vec<Issue>,
        pub timeline: HashMap<u64, Vec<u64>>,
        pub closing: HashMap<u64, Vec<String>>,
        pub commit_pulls: HashMap<String, Vec<u64>>,
        pub search: HashMap<u64, Vec<u64>>,
        pub pulls: HashMap<u64, ChangeDetails>,
        /// Issue numbers whose timeline query fails with a rate limit.
        pub failing_timeline: Vec<u64>,
        /// Artificial latency for `get_pull`, keyed by pull number.
        pub pull_delays: HashMap<u64, Duration>,
        pub pull_calls: Mutex<Vec<u64>>,
        pub search_calls: AtomicUsize,
    }

    impl FakeService {
        pub fn pull_call_count(&self, number: u64) -> usize {
            self.pull_calls.lock().map(|calls| calls.iter().filter(|n| **n == number).count()).unwrap_or(0)
        }
    }

    fn rate_limited(url: String) -> RemoteError {
        RemoteError::RetriesExhausted {
            url: url.clone(),
            attempts: 3,
            last: Box::new(RemoteError::Status { url, status: 403, body: "rate limit".into() }),
        }
    }

    impl RepositoryService for FakeService {
        fn default_branch(&self) -> Result<String, RemoteError> {
            Ok(self.default_branch.clone())
        }

        fn list_closed_issues(&self) -> Result<Vec<Issue>, RemoteError> {
            Ok(self.issues.iter().filter(|i| i.is_closed()).cloned().collect())
        }

        fn get_issue(&self, number: u64) -> Result<Issue, RemoteError> {
            self.issues
                .iter()
                .find(|i| i.number == number)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound { url: format!("issues/{number}") })
        }

        fn timeline_references(&self, issue: u64) -> Result<Vec<u64>, RemoteError> {
            if self.failing_timeline.contains(&issue) {
                return Err(rate_limited(format!("issues/{issue}/timeline")));
            }
            Ok(self.timeline.get(&issue).cloned().unwrap_or_default())
        }

        fn closing_commits(&self, issue: u64) -> Result<Vec<String>, RemoteError> {
            Ok(self.closing.get(&issue).cloned().unwrap_or_default())
        }

        fn pulls_for_commit(&self, sha: &str) -> Result<Vec<u64>, RemoteError> {
            Ok(self.commit_pulls.get(sha).cloned().unwrap_or_default())
        }

        fn search_pull_references(&self, issue: u64) -> Result<Vec<u64>, RemoteError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.search.get(&issue).cloned().unwrap_or_default())
        }

        fn get_pull(&self, number: u64) -> Result<ChangeDetails, RemoteError> {
            if let Ok(mut calls) = self.pull_calls.lock() {
                calls.push(number);
            }
            if let Some(delay) = self.pull_delays.get(&number) {
                std::thread::sleep(*delay);
            }
            self.pulls
                .get(&number)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound { url: format!("pulls/{number}") })
        }
    }
}
