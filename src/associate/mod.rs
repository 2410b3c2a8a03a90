//! Linking issues to the changes that addressed them.
//!
//! Two interchangeable [`AssociationResolver`]s exist: [`RemoteResolver`]
//! asks the repository service, [`LocalResolver`] reads the commit history of
//! a snapshot. Both hand candidate numbers to [`collect_changes`], which
//! fetches merge state once per change through a shared [`ChangeCache`].

use crate::domain::{AssociatedChange, Config, Strategy};
use crate::fetch::SnapshotHandle;
use crate::github::{ChangeDetails, RemoteError, RepositoryService};
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

pub mod history;
pub mod local;
pub mod remote;
pub mod scanner;

pub use history::CommitHistory;
pub use local::LocalResolver;
pub use remote::{QuerySet, RemoteResolver};
pub use scanner::ChangeReferenceScanner;

/// Changes found for one issue plus anything worth reporting about the search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub changes: Vec<AssociatedChange>,
    pub notes: Vec<String>,
}

pub trait AssociationResolver: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Deduplicated changes associated with `issue_number`.
    fn resolve(&self, issue_number: u64) -> Result<Resolution>;
}

/// Change details keyed by number, shared by every worker of a run.
///
/// `None` records a change the service does not know about. Each number gets
/// one cell, so concurrent lookups of the same change wait for a single fetch.
#[derive(Default)]
pub struct ChangeCache {
    entries: Mutex<HashMap<u64, Arc<OnceCell<Option<ChangeDetails>>>>>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, number: u64) -> Arc<OnceCell<Option<ChangeDetails>>> {
        match self.entries.lock() {
            Ok(mut entries) => entries.entry(number).or_default().clone(),
            Err(_) => Arc::new(OnceCell::new()),
        }
    }

    /// Fetch `number` unless an earlier lookup already settled it.
    ///
    /// Transient failures leave the cell empty, so a later issue may retry.
    pub fn lookup(
        &self,
        service: &dyn RepositoryService,
        number: u64,
    ) -> Result<Option<ChangeDetails>, RemoteError> {
        let cell = self.cell(number);
        cell.get_or_try_init(|| match service.get_pull(number) {
            Ok(details) => Ok(Some(details)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        })
        .cloned()
    }

    /// Number of settled changes.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.values().filter(|c| c.get().is_some()).count()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn candidate numbers into associated changes, one per number.
///
/// Numbers that are not changes are dropped; lookup failures become notes.
pub fn collect_changes(
    service: &dyn RepositoryService,
    cache: &ChangeCache,
    issue_number: u64,
    candidates: &BTreeSet<u64>,
    notes: &mut Vec<String>,
) -> Vec<AssociatedChange> {
    let mut changes = Vec::with_capacity(candidates.len());
    for &number in candidates {
        match cache.lookup(service, number) {
            Ok(Some(details)) => changes.push(details.for_issue(issue_number)),
            Ok(None) => tracing::debug!("#{} is not a pull request; skipping", number),
            Err(err) => {
                tracing::warn!("Issue #{}: lookup of change #{} failed: {}", issue_number, number, err);
                notes.push(format!("change #{number} lookup failed: {err}"));
            }
        }
    }
    changes
}

/// Build the resolver for the configured strategy.
///
/// The local strategy needs the snapshot; its history is read here.
pub fn select_resolver(
    config: &Config,
    service: Arc<dyn RepositoryService>,
    snapshot: Option<&SnapshotHandle>,
) -> Result<Box<dyn AssociationResolver>> {
    let cache = Arc::new(ChangeCache::new());
    let queries = QuerySet { timeline: true, closing_events: true, search: config.include_search };

    match config.strategy {
        Strategy::Remote => {
            Ok(Box::new(RemoteResolver::new(service, cache, queries, config.search_delay())))
        }
        Strategy::Local => {
            let snapshot = snapshot.context("The local strategy requires a repository snapshot")?;
            let history = CommitHistory::load(snapshot.path()).context("Failed reading commit history")?;
            let fallback = config.local_api_fallback.then(|| {
                let queries = QuerySet { search: false, ..queries };
                RemoteResolver::new(service.clone(), cache.clone(), queries, config.search_delay())
            });
            Ok(Box::new(LocalResolver::new(ChangeReferenceScanner::new(history), service, cache, fallback)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeState;
    use crate::domain::Issue;
    use crate::github::fake::FakeService;
    use std::time::Duration;

    /// Service whose pull lookups always hit a server error.
    struct FailingPulls {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl RepositoryService for FailingPulls {
        fn default_branch(&self) -> Result<String, RemoteError> {
            Ok("main".to_string())
        }
        fn list_closed_issues(&self) -> Result<Vec<Issue>, RemoteError> {
            Ok(Vec::new())
        }
        fn get_issue(&self, number: u64) -> Result<Issue, RemoteError> {
            Err(RemoteError::NotFound { url: format!("issues/{number}") })
        }
        fn timeline_references(&self, _issue: u64) -> Result<Vec<u64>, RemoteError> {
            Ok(Vec::new())
        }
        fn closing_commits(&self, _issue: u64) -> Result<Vec<String>, RemoteError> {
            Ok(Vec::new())
        }
        fn pulls_for_commit(&self, _sha: &str) -> Result<Vec<u64>, RemoteError> {
            Ok(Vec::new())
        }
        fn search_pull_references(&self, _issue: u64) -> Result<Vec<u64>, RemoteError> {
            Ok(Vec::new())
        }
        fn get_pull(&self, number: u64) -> Result<ChangeDetails, RemoteError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(RemoteError::Status { url: format!("pulls/{number}"), status: 502, body: "bad gateway".into() })
        }
    }

    fn details(number: u64, state: ChangeState, base: &str) -> ChangeDetails {
        ChangeDetails {
            number,
            title: format!("Change {number}"),
            url: format!("https://github.com/acme/widgets/pull/{number}"),
            state,
            base_branch: base.to_string(),
        }
    }

    #[test]
    fn cache_fetches_each_change_once() {
        let mut fake = FakeService::default();
        fake.pulls.insert(11, details(11, ChangeState::Merged, "main"));
        let cache = ChangeCache::new();

        assert!(cache.lookup(&fake, 11).unwrap().is_some());
        assert!(cache.lookup(&fake, 11).unwrap().is_some());
        assert!(cache.lookup(&fake, 99).unwrap().is_none());
        assert!(cache.lookup(&fake, 99).unwrap().is_none());
        assert_eq!(fake.pull_call_count(11), 1);
        assert_eq!(fake.pull_call_count(99), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_lookups_share_one_fetch() {
        let mut fake = FakeService::default();
        fake.pulls.insert(11, details(11, ChangeState::Merged, "main"));
        fake.pull_delays.insert(11, Duration::from_millis(200));
        let cache = ChangeCache::new();
        let (cache_ref, fake_ref) = (&cache, &fake);

        std::thread::scope(|scope| {
            let handles: Vec<_> =
                (0..4).map(|_| scope.spawn(move || cache_ref.lookup(fake_ref, 11))).collect();
            for handle in handles {
                let details = handle.join().expect("lookup thread").expect("lookup");
                assert_eq!(details.map(|d| d.number), Some(11));
            }
        });
        assert_eq!(fake.pull_call_count(11), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn transient_failures_are_not_cached() {
        let fake = FakeService::default();
        let cache = ChangeCache::new();
        let failing = FailingPulls { calls: std::sync::atomic::AtomicUsize::new(0) };

        assert!(cache.lookup(&failing, 11).is_err());
        assert!(cache.lookup(&failing, 11).is_err());
        assert_eq!(failing.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert!(cache.lookup(&fake, 11).unwrap().is_none());
    }

    #[test]
    fn collect_changes_tags_changes_with_the_issue() {
        let mut fake = FakeService::default();
        fake.pulls.insert(11, details(11, ChangeState::Merged, "main"));
        fake.pulls.insert(12, details(12, ChangeState::Closed, "main"));
        let cache = ChangeCache::new();
        let mut notes = Vec::new();

        let candidates: BTreeSet<u64> = [12, 11, 40].into_iter().collect();
        let changes = collect_changes(&fake, &cache, 10, &candidates, &mut notes);
        assert_eq!(changes.iter().map(|c| c.number).collect::<Vec<_>>(), vec![11, 12]);
        assert!(changes.iter().all(|c| c.issue_number == 10));
        assert!(notes.is_empty());
    }

    #[test]
    fn local_strategy_without_snapshot_is_an_error() {
        let config = Config { strategy: Strategy::Local, ..Config::default() };
        let service: Arc<dyn RepositoryService> = Arc::new(FakeService::default());
        assert!(select_resolver(&config, service, None).is_err());
    }

    #[test]
    fn remote_strategy_needs_no_snapshot() {
        let config = Config::default();
        let service: Arc<dyn RepositoryService> = Arc::new(FakeService::default());
        let resolver = select_resolver(&config, service, None).unwrap();
        assert_eq!(resolver.strategy(), Strategy::Remote);
    }
}
