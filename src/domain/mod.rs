//! Core data model shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod config;

pub use config::{Config, ConfigError, RepoSlug, Strategy, MAX_WORKERS};

/// Version tag written into every run artifact.
pub const RESULT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// A tracked problem report, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    /// Empty when the remote service reports no body.
    pub body: String,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub url: String,
}

impl Issue {
    pub fn is_closed(&self) -> bool {
        self.state == IssueState::Closed
    }

    /// True when the body has any non-whitespace content.
    pub fn has_description(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    Open,
    Closed,
    Merged,
}

/// A pull request linked to an issue by one of the association strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedChange {
    pub number: u64,
    pub state: ChangeState,
    pub title: String,
    pub base_branch: String,
    pub url: String,
    /// Number of the issue this change was found for (lookup only).
    pub issue_number: u64,
}

impl AssociatedChange {
    /// Merged, and merged into exactly `branch` (case-sensitive).
    pub fn is_merged_into(&self, branch: &str) -> bool {
        self.state == ChangeState::Merged && self.base_branch == branch
    }
}

/// Outcome of the qualification filter for one issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationRecord {
    pub has_description: bool,
    pub has_merged_default_branch_change: bool,
    pub qualifying: bool,
    pub changes: Vec<AssociatedChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    No,
    Unknown,
}

/// Judgment attached to a qualifying issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub verdict: Verdict,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ClassificationVerdict {
    pub fn judged(is_match: bool, rationale: impl Into<String>) -> Self {
        Self {
            verdict: if is_match { Verdict::Yes } else { Verdict::No },
            rationale: rationale.into(),
            failure: None,
        }
    }

    pub fn unknown(failure: impl Into<String>) -> Self {
        Self { verdict: Verdict::Unknown, rationale: String::new(), failure: Some(failure.into()) }
    }

    pub fn is_positive(&self) -> bool {
        self.verdict == Verdict::Yes
    }
}

/// One issue together with everything the pipeline learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    #[serde(flatten)]
    pub issue: Issue,
    pub qualification: QualificationRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationVerdict>,
}

impl IssueRecord {
    pub fn new(issue: Issue, qualification: QualificationRecord) -> Self {
        Self { issue, qualification, classification: None }
    }

    pub fn is_qualifying(&self) -> bool {
        self.qualification.qualifying
    }
}

/// The aggregate written once at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub schema_version: String,
    pub repo: String,
    pub crawl_time: DateTime<Utc>,
    pub strategy: Strategy,
    pub default_branch: String,
    pub total_count: usize,
    pub qualifying_count: usize,
    pub positive_count: usize,
    pub issues: Vec<IssueRecord>,
}

impl RunResult {
    pub fn new(
        repo: &RepoSlug,
        strategy: Strategy,
        default_branch: impl Into<String>,
        issues: Vec<IssueRecord>,
    ) -> Self {
        let qualifying_count = issues.iter().filter(|r| r.is_qualifying()).count();
        let positive_count = issues
            .iter()
            .filter(|r| r.classification.as_ref().is_some_and(ClassificationVerdict::is_positive))
            .count();
        Self {
            schema_version: RESULT_SCHEMA_VERSION.to_string(),
            repo: repo.to_string(),
            crawl_time: Utc::now(),
            strategy,
            default_branch: default_branch.into(),
            total_count: issues.len(),
            qualifying_count,
            positive_count,
            issues,
        }
    }
}
