//! Runs association and qualification over every fetched issue.
//!
//! The remote strategy processes issues one at a time in listing order to
//! stay inside service rate limits. The local strategy fans out over a
//! bounded worker pool; results are collected into index-addressed slots and
//! returned sorted by issue number.

use crate::associate::AssociationResolver;
use crate::domain::{Issue, IssueRecord, Strategy};
use crate::qualify;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;

pub mod progress;

pub use progress::{ProgressEvent, ProgressReporter, ProgressTally};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Sequential,
    Pooled { workers: usize },
}

impl Schedule {
    pub fn for_strategy(strategy: Strategy, workers: usize) -> Self {
        match strategy {
            Strategy::Remote => Schedule::Sequential,
            Strategy::Local => Schedule::Pooled { workers: workers.max(1) },
        }
    }
}

pub struct Orchestrator<'a> {
    resolver: &'a dyn AssociationResolver,
    default_branch: &'a str,
    schedule: Schedule,
    resolve_unqualifiable: bool,
    show_progress: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(resolver: &'a dyn AssociationResolver, default_branch: &'a str, schedule: Schedule) -> Self {
        Self { resolver, default_branch, schedule, resolve_unqualifiable: false, show_progress: false }
    }

    /// Also resolve changes for issues that cannot qualify anyway.
    pub fn resolve_unqualifiable(mut self, enabled: bool) -> Self {
        self.resolve_unqualifiable = enabled;
        self
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// One record per input issue. Per-issue failures end up in the record's notes.
    pub fn run(&self, issues: &[Issue]) -> Result<Vec<IssueRecord>> {
        let reporter = ProgressReporter::start(issues.len(), "Resolving", self.show_progress);
        let records = match self.schedule {
            Schedule::Sequential => {
                let tx = reporter.sender();
                issues.iter().map(|issue| self.process(issue, &tx)).collect()
            }
            Schedule::Pooled { workers } => self.run_pooled(issues, workers, &reporter)?,
        };
        let tally = reporter.finish();
        tracing::info!("Processed {} issues; {} qualify", tally.processed, tally.qualifying);
        Ok(records)
    }

    fn run_pooled(&self, issues: &[Issue], workers: usize, reporter: &ProgressReporter) -> Result<Vec<IssueRecord>> {
        let workers = workers.min(issues.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("issue-worker-{i}"))
            .build()
            .context("Failed to build worker pool")?;

        let queue: Mutex<VecDeque<(usize, &Issue)>> = Mutex::new(issues.iter().enumerate().collect());
        let (results_tx, results_rx) = mpsc::channel::<(usize, IssueRecord)>();

        pool.scope(|scope| {
            for _ in 0..workers {
                let results_tx = results_tx.clone();
                let progress_tx = reporter.sender();
                let queue = &queue;
                scope.spawn(move |_| loop {
                    let next = queue.lock().ok().and_then(|mut q| q.pop_front());
                    let Some((idx, issue)) = next else { break };
                    let record = self.process(issue, &progress_tx);
                    if results_tx.send((idx, record)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(results_tx);

        let mut slots: Vec<Option<IssueRecord>> = (0..issues.len()).map(|_| None).collect();
        for (idx, record) in results_rx {
            slots[idx] = Some(record);
        }
        let mut records: Vec<IssueRecord> = slots.into_iter().flatten().collect();
        records.sort_by_key(|r| r.issue.number);
        Ok(records)
    }

    fn process(&self, issue: &Issue, progress: &Sender<ProgressEvent>) -> IssueRecord {
        let record = panic::catch_unwind(AssertUnwindSafe(|| self.qualify_issue(issue))).unwrap_or_else(|_| {
            let mut qualification = qualify::qualify(issue, Vec::new(), self.default_branch);
            qualification.notes.push("association panicked".to_string());
            IssueRecord::new(issue.clone(), qualification)
        });

        let _ = progress.send(ProgressEvent::Finished {
            number: issue.number,
            qualifying: record.is_qualifying(),
            summary: summarize(&record, self.default_branch, self.skips(issue)),
        });
        record
    }

    fn skips(&self, issue: &Issue) -> bool {
        !self.resolve_unqualifiable && qualify::disqualifier(issue).is_some()
    }

    fn qualify_issue(&self, issue: &Issue) -> IssueRecord {
        if !self.resolve_unqualifiable {
            if let Some(reason) = qualify::disqualifier(issue) {
                let mut qualification = qualify::qualify(issue, Vec::new(), self.default_branch);
                qualification.notes.push(format!("association skipped: {reason}"));
                return IssueRecord::new(issue.clone(), qualification);
            }
        }

        let qualification = match self.resolver.resolve(issue.number) {
            Ok(resolution) => {
                let mut q = qualify::qualify(issue, resolution.changes, self.default_branch);
                q.notes.extend(resolution.notes);
                q
            }
            Err(err) => {
                tracing::warn!("Issue #{}: association failed: {:#}", issue.number, err);
                let mut q = qualify::qualify(issue, Vec::new(), self.default_branch);
                q.notes.push(format!("association failed: {err:#}"));
                q
            }
        };
        IssueRecord::new(issue.clone(), qualification)
    }
}

/// One-line progress summary. `skipped` means association never ran.
fn summarize(record: &IssueRecord, default_branch: &str, skipped: bool) -> String {
    let q = &record.qualification;
    let prefix = if skipped { "skipped, " } else { "" };
    if q.qualifying {
        let merged = q.changes.iter().filter(|c| c.is_merged_into(default_branch)).count();
        format!("qualifies ({merged} change(s) merged into {default_branch})")
    } else if !record.issue.has_description() {
        format!("{prefix}no description")
    } else if !record.issue.is_closed() {
        format!("{prefix}not closed")
    } else if q.changes.is_empty() {
        "no associated changes".to_string()
    } else {
        format!("{} change(s), none merged into {default_branch}", q.changes.len())
    }
}
