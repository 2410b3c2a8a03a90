//! Run configuration and its validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the local-strategy worker pool.
pub const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No repository specified (pass OWNER/REPO or set `repo` in the config file)")]
    MissingRepo,

    #[error("Invalid repository '{0}' (expected OWNER/REPO)")]
    InvalidRepo(String),

    #[error("Invalid strategy '{0}' (expected 'remote' or 'local')")]
    InvalidStrategy(String),

    #[error("Invalid worker count {0} (must be between 1 and 64)")]
    WorkerCount(usize),

    #[error("Default branch override must not be empty")]
    EmptyDefaultBranch,

    #[error("max_attempts must be at least 1")]
    MaxAttempts,

    #[error("{0} is not set; it is required for classification")]
    MissingCredential(&'static str),
}

/// Association strategy selected at run start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Remote API queries only; issues are processed one at a time.
    #[default]
    Remote,
    /// History scan over a temporary clone; issues are processed by a worker pool.
    Local,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "api" => Ok(Self::Remote),
            "local" | "local-clone" => Ok(Self::Local),
            _ => Err(ConfigError::InvalidStrategy(s.to_string())),
        }
    }
}

/// Repository coordinates in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Directory-safe form, e.g. `owner-name`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('/').trim_end_matches(".git");
        let trimmed = trimmed.strip_prefix("https://github.com/").unwrap_or(trimmed);
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if valid_segment(owner) && valid_segment(name) => {
                Ok(Self { owner: owner.to_string(), name: name.to_string() })
            }
            _ => Err(ConfigError::InvalidRepo(s.to_string())),
        }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Full run configuration (defaults < config file < environment < CLI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repo: Option<String>,
    pub strategy: Strategy,
    pub workers: usize,
    pub default_branch: Option<String>,
    pub api_base_url: String,
    pub clone_url: Option<String>,
    pub clone_depth: Option<u32>,
    pub snapshot_root: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub search_delay_ms: u64,
    pub include_search: bool,
    pub local_api_fallback: bool,
    pub resolve_unqualifiable: bool,
    pub limit: Option<usize>,
    pub criteria_path: Option<PathBuf>,
    pub llm_base_url: String,
    pub model: String,
    pub temperature: f32,
    #[serde(skip)]
    pub github_token: Option<String>,
    #[serde(skip)]
    pub llm_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: None,
            strategy: Strategy::Remote,
            workers: 10,
            default_branch: None,
            api_base_url: "https://api.github.com".to_string(),
            clone_url: None,
            clone_depth: None,
            snapshot_root: None,
            output_dir: PathBuf::from("data/hooked_issue"),
            max_attempts: 3,
            initial_backoff_ms: 2000,
            max_backoff_ms: 60_000,
            search_delay_ms: 2000,
            include_search: true,
            local_api_fallback: true,
            resolve_unqualifiable: false,
            limit: None,
            criteria_path: None,
            llm_base_url: "https://api.forge.tensorblock.co/v1".to_string(),
            model: "OpenAI/gpt-4o".to_string(),
            temperature: 0.3,
            github_token: None,
            llm_api_key: None,
        }
    }
}

impl Config {
    /// Check every field that does not need the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::WorkerCount(self.workers));
        }
        if self.default_branch.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(ConfigError::EmptyDefaultBranch);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::MaxAttempts);
        }
        Ok(())
    }

    pub fn repo_slug(&self) -> Result<RepoSlug, ConfigError> {
        self.repo.as_deref().ok_or(ConfigError::MissingRepo)?.parse()
    }

    /// Clone URL for the local strategy, honoring the override.
    pub fn clone_url_for(&self, slug: &RepoSlug) -> String {
        self.clone_url.clone().unwrap_or_else(|| format!("https://github.com/{slug}.git"))
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }
}
