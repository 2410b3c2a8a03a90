//! GitHub REST payloads, trimmed to the fields the pipeline reads.

use crate::domain::{AssociatedChange, ChangeState, Issue, IssueState};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<ApiLabel>,
    pub html_url: String,
    /// Present only when the "issue" is really a pull request.
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLabel {
    pub name: String,
}

impl ApiIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn into_issue(self) -> Issue {
        Issue {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: if self.state.eq_ignore_ascii_case("closed") {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            created_at: self.created_at,
            closed_at: self.closed_at,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            url: self.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub source: Option<TimelineSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineSource {
    #[serde(default)]
    pub issue: Option<SourceIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceIssue {
    pub number: u64,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueEvent {
    pub event: String,
    #[serde(default)]
    pub commit_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub number: u64,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPull {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merged_at: Option<String>,
    pub base: ApiRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRef {
    #[serde(rename = "ref")]
    pub ref_: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRepository {
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitPull {
    pub number: u64,
}

/// Merge state and target of one pull request, independent of any issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDetails {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: ChangeState,
    pub base_branch: String,
}

impl ChangeDetails {
    pub fn for_issue(&self, issue_number: u64) -> AssociatedChange {
        AssociatedChange {
            number: self.number,
            state: self.state,
            title: self.title.clone(),
            base_branch: self.base_branch.clone(),
            url: self.url.clone(),
            issue_number,
        }
    }
}

impl From<ApiPull> for ChangeDetails {
    fn from(pull: ApiPull) -> Self {
        let state = if pull.merged || pull.merged_at.is_some() {
            ChangeState::Merged
        } else if pull.state.eq_ignore_ascii_case("open") {
            ChangeState::Open
        } else {
            ChangeState::Closed
        };
        Self {
            number: pull.number,
            title: pull.title,
            url: pull.html_url,
            state,
            base_branch: pull.base.ref_,
        }
    }
}

/// Pull requests that cross-referenced or were connected to the issue.
pub fn pulls_from_timeline(events: &[TimelineEvent]) -> Vec<u64> {
    let found: BTreeSet<u64> = events
        .iter()
        .filter(|e| matches!(e.event.as_deref(), Some("cross-referenced" | "connected")))
        .filter_map(|e| e.source.as_ref()?.issue.as_ref())
        .filter(|issue| issue.pull_request.is_some())
        .map(|issue| issue.number)
        .collect();
    found.into_iter().collect()
}

/// Commit SHAs recorded on `closed` events.
pub fn closing_commit_ids(events: &[IssueEvent]) -> Vec<String> {
    let mut ids: Vec<String> = events
        .iter()
        .filter(|e| e.event == "closed")
        .filter_map(|e| e.commit_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

pub fn pulls_from_search(response: &SearchResponse) -> Vec<u64> {
    let found: BTreeSet<u64> = response
        .items
        .iter()
        .filter(|item| item.pull_request.is_some())
        .map(|item| item.number)
        .collect();
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issue_without_body_becomes_empty_description() {
        let api: ApiIssue = serde_json::from_value(json!({
            "number": 12,
            "title": "Empty",
            "body": null,
            "state": "closed",
            "created_at": "2024-03-01T12:00:00Z",
            "closed_at": "2024-03-02T12:00:00Z",
            "labels": [{"name": "bug"}],
            "html_url": "https://github.com/acme/widgets/issues/12"
        }))
        .unwrap();
        assert!(!api.is_pull_request());
        let issue = api.into_issue();
        assert_eq!(issue.body, "");
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(issue.labels, vec!["bug".to_string()]);
    }

    #[test]
    fn pull_request_entries_are_detected() {
        let api: ApiIssue = serde_json::from_value(json!({
            "number": 11,
            "title": "Fix",
            "state": "closed",
            "created_at": "2024-03-01T12:00:00Z",
            "html_url": "https://github.com/acme/widgets/pull/11",
            "pull_request": {"url": "https://api.github.com/repos/acme/widgets/pulls/11"}
        }))
        .unwrap();
        assert!(api.is_pull_request());
    }

    #[test]
    fn timeline_keeps_only_pull_request_references() {
        let events: Vec<TimelineEvent> = serde_json::from_value(json!([
            {"event": "labeled"},
            {"event": "cross-referenced", "source": {"issue": {"number": 11, "pull_request": {}}}},
            {"event": "cross-referenced", "source": {"issue": {"number": 40}}},
            {"event": "connected", "source": {"issue": {"number": 11, "pull_request": {}}}},
            {"event": "connected", "source": {"issue": {"number": 7, "pull_request": {}}}}
        ]))
        .unwrap();
        assert_eq!(pulls_from_timeline(&events), vec![7, 11]);
    }

    #[test]
    fn closing_commits_come_from_closed_events() {
        let events: Vec<IssueEvent> = serde_json::from_value(json!([
            {"event": "referenced", "commit_id": "aaa"},
            {"event": "closed", "commit_id": "bbb"},
            {"event": "reopened"},
            {"event": "closed", "commit_id": null}
        ]))
        .unwrap();
        assert_eq!(closing_commit_ids(&events), vec!["bbb".to_string()]);
    }

    #[test]
    fn merged_flag_or_timestamp_marks_merged() {
        let base = json!({
            "number": 11, "title": "Fix", "html_url": "u", "state": "closed",
            "base": {"ref": "main"}
        });
        let mut merged = base.clone();
        merged["merged_at"] = json!("2024-03-09T08:00:00Z");
        let details: ChangeDetails = serde_json::from_value::<ApiPull>(merged).unwrap().into();
        assert_eq!(details.state, ChangeState::Merged);
        assert_eq!(details.base_branch, "main");

        let closed: ChangeDetails = serde_json::from_value::<ApiPull>(base).unwrap().into();
        assert_eq!(closed.state, ChangeState::Closed);
    }
}
