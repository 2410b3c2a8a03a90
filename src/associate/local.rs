//! Association from the commit history of a local snapshot.

use super::{collect_changes, AssociationResolver, ChangeCache, ChangeReferenceScanner, RemoteResolver, Resolution};
use crate::domain::Strategy;
use crate::github::RepositoryService;
use anyhow::Result;
use std::sync::Arc;

pub struct LocalResolver {
    scanner: ChangeReferenceScanner,
    service: Arc<dyn RepositoryService>,
    cache: Arc<ChangeCache>,
    /// Consulted only when the history names no change for an issue.
    fallback: Option<RemoteResolver>,
}

impl LocalResolver {
    pub fn new(
        scanner: ChangeReferenceScanner,
        service: Arc<dyn RepositoryService>,
        cache: Arc<ChangeCache>,
        fallback: Option<RemoteResolver>,
    ) -> Self {
        Self { scanner, service, cache, fallback }
    }
}

impl AssociationResolver for LocalResolver {
    fn strategy(&self) -> Strategy {
        Strategy::Local
    }

    fn resolve(&self, issue_number: u64) -> Result<Resolution> {
        let mut notes = Vec::new();
        let mut candidates = self.scanner.find_references(issue_number);

        if candidates.is_empty() {
            if let Some(fallback) = &self.fallback {
                candidates = fallback.candidate_changes(issue_number, &mut notes);
                if !candidates.is_empty() {
                    tracing::debug!("Issue #{}: history had no references; service found {}", issue_number, candidates.len());
                    notes.push("changes found via service fallback".to_string());
                }
            }
        }

        let changes = collect_changes(self.service.as_ref(), &self.cache, issue_number, &candidates, &mut notes);
        Ok(Resolution { changes, notes })
    }
}
