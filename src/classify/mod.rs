//! Batch classification of qualifying issues.
//!
//! Runs once per crawl, after every issue has been qualified, and only over
//! the qualifying ones.

use crate::domain::{ClassificationVerdict, Issue, IssueRecord};
use anyhow::Result;

pub mod llm;
pub mod prompt;

pub use llm::ChatJudge;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub is_match: bool,
    pub rationale: String,
}

/// Opaque issue-text to verdict service. Answers may differ between calls.
pub trait IssueJudge: Send + Sync {
    fn judge(&self, issue_text: &str) -> Result<Judgment>;
}

/// One verdict per issue, in input order. A failed call yields an unknown verdict.
pub fn classify_all(judge: &dyn IssueJudge, issues: &[&Issue]) -> Vec<ClassificationVerdict> {
    let total = issues.len();
    issues
        .iter()
        .enumerate()
        .map(|(idx, issue)| {
            tracing::info!("Classifying {}/{}: issue #{}", idx + 1, total, issue.number);
            match judge.judge(&prompt::issue_text(issue)) {
                Ok(judgment) => ClassificationVerdict::judged(judgment.is_match, judgment.rationale),
                Err(err) => {
                    tracing::warn!("Issue #{}: classification failed: {:#}", issue.number, err);
                    ClassificationVerdict::unknown(format!("{err:#}"))
                }
            }
        })
        .collect()
}

/// Classify the qualifying records and attach their verdicts. Returns how many were judged.
pub fn classify_qualifying(judge: &dyn IssueJudge, records: &mut [IssueRecord]) -> usize {
    let verdicts = {
        let qualifying: Vec<&Issue> = records.iter().filter(|r| r.is_qualifying()).map(|r| &r.issue).collect();
        if qualifying.is_empty() {
            tracing::info!("No qualifying issues to classify");
            return 0;
        }
        classify_all(judge, &qualifying)
    };

    let judged = verdicts.len();
    let targets = records.iter_mut().filter(|r| r.is_qualifying());
    for (record, verdict) in targets.zip(verdicts) {
        record.classification = Some(verdict);
    }
    judged
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::Mutex;

    /// Judge that answers from the issue text and records every call.
    #[derive(Default)]
    pub struct StubJudge {
        pub calls: Mutex<Vec<String>>,
        /// Substrings that make the call fail.
        pub fail_on: Vec<String>,
    }

    impl StubJudge {
        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    impl IssueJudge for StubJudge {
        fn judge(&self, issue_text: &str) -> Result<Judgment> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(issue_text.to_string());
            }
            if self.fail_on.iter().any(|f| issue_text.contains(f.as_str())) {
                anyhow::bail!("service unavailable");
            }
            let is_match = issue_text.contains("provider");
            let rationale = if is_match { "provider auth issue" } else { "not agent related" };
            Ok(Judgment { is_match, rationale: rationale.to_string() })
        }
    }
}
