//! GitHub REST client

use super::types::{
    closing_commit_ids, pulls_from_search, pulls_from_timeline, ApiIssue, ApiPull, ApiRepository,
    ChangeDetails, CommitPull, IssueEvent, SearchResponse, TimelineEvent,
};
use super::RepositoryService;
use crate::domain::{Config, Issue, RepoSlug};
use crate::retry::{send_with_retry, RemoteError, RetryPolicy};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ACCEPT: &str = "application/vnd.github+json";
/// Hard stop for runaway pagination.
const MAX_PAGES: usize = 1000;

pub struct GitHubClient {
    http: Client,
    api_base: String,
    slug: RepoSlug,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(config: &Config, slug: RepoSlug) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("issue-hook/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        if config.github_token.is_none() {
            tracing::warn!("GITHUB_TOKEN is not set; unauthenticated requests have a much lower rate limit");
        }

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            slug,
            token: config.github_token.clone().filter(|t| !t.is_empty()),
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn slug(&self) -> &RepoSlug {
        &self.slug
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.api_base, self.slug, path)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, RemoteError> {
        let response = send_with_retry(&self.retry, url, || {
            let mut request = self.http.get(url).header("Accept", ACCEPT).query(query);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            request.send()
        })?;

        let text = response
            .text()
            .map_err(|source| RemoteError::Transport { url: url.to_string(), source })?;
        serde_json::from_str(&text).map_err(|source| RemoteError::Decode { url: url.to_string(), source })
    }

    /// Follow `page=` pagination until a short page comes back.
    fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut page_query = query.to_vec();
            page_query.push(("per_page", PER_PAGE.to_string()));
            page_query.push(("page", page.to_string()));

            let batch: Vec<T> = self.get_json(url, &page_query)?;
            let count = batch.len();
            items.extend(batch);
            tracing::debug!("{}: page {} returned {} items", url, page, count);
            if count < PER_PAGE {
                break;
            }
        }
        Ok(items)
    }
}

impl RepositoryService for GitHubClient {
    fn default_branch(&self) -> Result<String, RemoteError> {
        let repo: ApiRepository = self.get_json(&self.repo_url(""), &[])?;
        Ok(repo.default_branch)
    }

    fn list_closed_issues(&self) -> Result<Vec<Issue>, RemoteError> {
        let url = self.repo_url("/issues");
        let raw: Vec<ApiIssue> = self.get_paginated(&url, &[("state", "closed".to_string())])?;
        let total = raw.len();
        let issues: Vec<Issue> =
            raw.into_iter().filter(|i| !i.is_pull_request()).map(ApiIssue::into_issue).collect();
        tracing::info!("Fetched {} closed issues ({} pull requests skipped)", issues.len(), total - issues.len());
        Ok(issues)
    }

    fn get_issue(&self, number: u64) -> Result<Issue, RemoteError> {
        let api: ApiIssue = self.get_json(&self.repo_url(&format!("/issues/{number}")), &[])?;
        Ok(api.into_issue())
    }

    fn timeline_references(&self, issue: u64) -> Result<Vec<u64>, RemoteError> {
        let url = self.repo_url(&format!("/issues/{issue}/timeline"));
        let events: Vec<TimelineEvent> = self.get_paginated(&url, &[])?;
        Ok(pulls_from_timeline(&events))
    }

    fn closing_commits(&self, issue: u64) -> Result<Vec<String>, RemoteError> {
        let url = self.repo_url(&format!("/issues/{issue}/events"));
        let events: Vec<IssueEvent> = self.get_paginated(&url, &[])?;
        Ok(closing_commit_ids(&events))
    }

    fn pulls_for_commit(&self, sha: &str) -> Result<Vec<u64>, RemoteError> {
        let pulls: Vec<CommitPull> = self.get_json(&self.repo_url(&format!("/commits/{sha}/pulls")), &[])?;
        Ok(pulls.into_iter().map(|p| p.number).collect())
    }

    fn search_pull_references(&self, issue: u64) -> Result<Vec<u64>, RemoteError> {
        let url = format!("{}/search/issues", self.api_base);
        let query = [("q", format!("repo:{} type:pr #{}", self.slug, issue)), ("per_page", "10".to_string())];
        let response: SearchResponse = self.get_json(&url, &query)?;
        Ok(pulls_from_search(&response))
    }

    fn get_pull(&self, number: u64) -> Result<ChangeDetails, RemoteError> {
        let pull: ApiPull = self.get_json(&self.repo_url(&format!("/pulls/{number}")), &[])?;
        Ok(pull.into())
    }
}
