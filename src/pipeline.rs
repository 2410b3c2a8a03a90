//! End-to-end crawl: snapshot, listing, association, qualification,
//! classification and the single result write.

use crate::associate::select_resolver;
use crate::classify::{self, IssueJudge};
use crate::domain::{Config, RepoSlug, RunResult, Strategy};
use crate::fetch::acquire_snapshot;
use crate::github::RepositoryService;
use crate::orchestrate::{Orchestrator, Schedule};
use crate::render::write_run_result;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub struct RunOutcome {
    pub result: RunResult,
    pub path: PathBuf,
}

pub struct Pipeline {
    config: Config,
    slug: RepoSlug,
    service: Arc<dyn RepositoryService>,
    judge: Arc<dyn IssueJudge>,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(
        config: Config,
        slug: RepoSlug,
        service: Arc<dyn RepositoryService>,
        judge: Arc<dyn IssueJudge>,
    ) -> Self {
        Self { config, slug, service, judge, show_progress: false }
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn run(&self) -> Result<RunOutcome> {
        self.config.validate()?;
        let strategy = self.config.strategy;

        let default_branch = match &self.config.default_branch {
            Some(branch) => branch.clone(),
            None => self.service.default_branch().context("Failed resolving default branch")?,
        };
        tracing::info!("Crawling {} ({} strategy, default branch {})", self.slug, strategy, default_branch);

        // Held until association finishes; dropping it removes the directory.
        let snapshot = match strategy {
            Strategy::Local => {
                let clone_url = self.config.clone_url_for(&self.slug);
                let handle = acquire_snapshot(
                    &self.slug,
                    &clone_url,
                    self.config.snapshot_root.as_deref(),
                    self.config.clone_depth,
                )
                .context("Failed acquiring repository snapshot")?;
                Some(handle)
            }
            Strategy::Remote => None,
        };

        let mut issues = self.service.list_closed_issues().context("Failed listing closed issues")?;
        if let Some(limit) = self.config.limit {
            issues.truncate(limit);
        }
        tracing::info!("Processing {} closed issues", issues.len());

        let records = {
            let resolver = select_resolver(&self.config, self.service.clone(), snapshot.as_ref())?;
            Orchestrator::new(resolver.as_ref(), &default_branch, Schedule::for_strategy(strategy, self.config.workers))
                .resolve_unqualifiable(self.config.resolve_unqualifiable)
                .show_progress(self.show_progress)
                .run(&issues)?
        };
        drop(snapshot);

        let mut records = records;
        let judged = classify::classify_qualifying(self.judge.as_ref(), &mut records);
        tracing::debug!("Classified {} qualifying issues", judged);

        let result = RunResult::new(&self.slug, strategy, default_branch, records);
        let path = write_run_result(&self.config.output_dir, &result).context("Failed writing run result")?;
        Ok(RunOutcome { result, path })
    }
}
