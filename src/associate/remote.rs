//! Association through the repository service's query interface.

use super::{collect_changes, AssociationResolver, ChangeCache, Resolution};
use crate::domain::Strategy;
use crate::github::RepositoryService;
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Which service queries contribute candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySet {
    /// Cross-reference and connection events on the issue timeline.
    pub timeline: bool,
    /// Commits recorded on `closed` events, mapped to their pull requests.
    pub closing_events: bool,
    /// Full-text search for pull requests mentioning `#N`.
    pub search: bool,
}

impl Default for QuerySet {
    fn default() -> Self {
        Self { timeline: true, closing_events: true, search: true }
    }
}

pub struct RemoteResolver {
    service: Arc<dyn RepositoryService>,
    cache: Arc<ChangeCache>,
    queries: QuerySet,
    search_delay: Duration,
}

impl RemoteResolver {
    pub fn new(
        service: Arc<dyn RepositoryService>,
        cache: Arc<ChangeCache>,
        queries: QuerySet,
        search_delay: Duration,
    ) -> Self {
        Self { service, cache, queries, search_delay }
    }

    /// Union of every enabled query. A failed query contributes nothing and leaves a note.
    pub fn candidate_changes(&self, issue_number: u64, notes: &mut Vec<String>) -> BTreeSet<u64> {
        let mut candidates = BTreeSet::new();

        if self.queries.timeline {
            match self.service.timeline_references(issue_number) {
                Ok(numbers) => candidates.extend(numbers),
                Err(err) => record_failure(issue_number, "timeline", &err, notes),
            }
        }

        if self.queries.closing_events {
            match self.service.closing_commits(issue_number) {
                Ok(shas) => {
                    for sha in shas {
                        match self.service.pulls_for_commit(&sha) {
                            Ok(numbers) => candidates.extend(numbers),
                            Err(err) => record_failure(issue_number, "commit pulls", &err, notes),
                        }
                    }
                }
                Err(err) => record_failure(issue_number, "closing events", &err, notes),
            }
        }

        if self.queries.search {
            // The search endpoint has a much tighter rate limit than the rest.
            if !self.search_delay.is_zero() {
                std::thread::sleep(self.search_delay);
            }
            match self.service.search_pull_references(issue_number) {
                Ok(numbers) => candidates.extend(numbers),
                Err(err) => record_failure(issue_number, "search", &err, notes),
            }
        }

        candidates.remove(&issue_number);
        candidates
    }
}

fn record_failure(issue_number: u64, query: &str, err: &dyn std::fmt::Display, notes: &mut Vec<String>) {
    tracing::warn!("Issue #{}: {} query failed: {}", issue_number, query, err);
    notes.push(format!("{query} query failed: {err}"));
}

impl AssociationResolver for RemoteResolver {
    fn strategy(&self) -> Strategy {
        Strategy::Remote
    }

    fn resolve(&self, issue_number: u64) -> Result<Resolution> {
        let mut notes = Vec::new();
        let candidates = self.candidate_changes(issue_number, &mut notes);
        tracing::debug!("Issue #{}: {} candidate change(s) from the service", issue_number, candidates.len());
        let changes = collect_changes(self.service.as_ref(), &self.cache, issue_number, &candidates, &mut notes);
        Ok(Resolution { changes, notes })
    }
}
