//! Layering environment and CLI values over the file config.

use crate::domain::{Config, Strategy};
use anyhow::{Context, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "ISSUE_HOOK_";

/// Values given on the command line. `None` and `false` leave the config alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub repo: Option<String>,
    pub strategy: Option<Strategy>,
    pub workers: Option<usize>,
    pub default_branch: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub clone_url: Option<String>,
    pub clone_depth: Option<u32>,
    pub snapshot_root: Option<PathBuf>,
    pub limit: Option<usize>,
    pub criteria_path: Option<PathBuf>,
    pub model: Option<String>,
    pub no_search: bool,
    pub no_local_fallback: bool,
    pub resolve_unqualifiable: bool,
    pub github_token: Option<String>,
    pub llm_api_key: Option<String>,
}

/// Apply `ISSUE_HOOK_*` variables, e.g. `ISSUE_HOOK_WORKERS=4`.
pub fn apply_env_overrides(config: Config) -> Result<Config> {
    merge_env_with_config(config, ENV_PREFIX)
}

fn merge_env_with_config(config: Config, prefix: &str) -> Result<Config> {
    // Credentials are not serialized, so they are carried across by hand.
    let github_token = config.github_token.clone();
    let llm_api_key = config.llm_api_key.clone();

    let mut merged: Config = Figment::from(Serialized::defaults(&config))
        .merge(Env::prefixed(prefix))
        .extract()
        .with_context(|| format!("Invalid {prefix}* environment variable"))?;

    merged.github_token = github_token;
    merged.llm_api_key = llm_api_key;
    Ok(merged)
}

pub fn merge_cli_with_config(mut config: Config, cli: CliOverrides) -> Config {
    if let Some(repo) = cli.repo {
        config.repo = Some(repo);
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(branch) = cli.default_branch {
        config.default_branch = Some(branch);
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(url) = cli.clone_url {
        config.clone_url = Some(url);
    }
    if let Some(depth) = cli.clone_depth {
        config.clone_depth = Some(depth);
    }
    if let Some(root) = cli.snapshot_root {
        config.snapshot_root = Some(root);
    }
    if let Some(limit) = cli.limit {
        config.limit = Some(limit);
    }
    if let Some(path) = cli.criteria_path {
        config.criteria_path = Some(path);
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if cli.no_search {
        config.include_search = false;
    }
    if cli.no_local_fallback {
        config.local_api_fallback = false;
    }
    if cli.resolve_unqualifiable {
        config.resolve_unqualifiable = true;
    }
    if let Some(token) = cli.github_token.filter(|t| !t.is_empty()) {
        config.github_token = Some(token);
    }
    if let Some(key) = cli.llm_api_key.filter(|k| !k.is_empty()) {
        config.llm_api_key = Some(key);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn cli_values_win_and_absent_flags_keep_config() {
        let config = Config { workers: 4, include_search: true, model: "m1".into(), ..Config::default() };
        let merged = merge_cli_with_config(
            config,
            CliOverrides {
                repo: Some("acme/widgets".into()),
                strategy: Some(Strategy::Local),
                no_search: true,
                ..CliOverrides::default()
            },
        );
        assert_eq!(merged.repo.as_deref(), Some("acme/widgets"));
        assert_eq!(merged.strategy, Strategy::Local);
        assert_eq!(merged.workers, 4);
        assert_eq!(merged.model, "m1");
        assert!(!merged.include_search);
    }

    #[test]
    fn empty_credentials_are_ignored() {
        let config = Config { github_token: Some("file".into()), ..Config::default() };
        let merged = merge_cli_with_config(
            config,
            CliOverrides { github_token: Some(String::new()), llm_api_key: Some("k".into()), ..CliOverrides::default() },
        );
        assert_eq!(merged.github_token.as_deref(), Some("file"));
        assert_eq!(merged.llm_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let prefix = "ISSUE_HOOK_TEST_MERGE_A_";
        env::set_var(format!("{prefix}WORKERS"), "7");
        env::set_var(format!("{prefix}STRATEGY"), "local");
        env::set_var(format!("{prefix}INCLUDE_SEARCH"), "false");

        let config = Config { workers: 3, llm_api_key: Some("k".into()), ..Config::default() };
        let merged = merge_env_with_config(config, prefix).expect("merge");
        assert_eq!(merged.workers, 7);
        assert_eq!(merged.strategy, Strategy::Local);
        assert!(!merged.include_search);
        assert_eq!(merged.llm_api_key.as_deref(), Some("k"));
        assert_eq!(merged.output_dir, PathBuf::from("data/hooked_issue"));
    }

    #[test]
    fn malformed_environment_value_is_an_error() {
        let prefix = "ISSUE_HOOK_TEST_MERGE_B_";
        env::set_var(format!("{prefix}WORKERS"), "lots");
        assert!(merge_env_with_config(Config::default(), prefix).is_err());
    }
}
