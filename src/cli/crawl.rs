//! Crawl command implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::classify::{prompt, ChatJudge};
use crate::config::{apply_env_overrides, load_config, merge_cli_with_config, CliOverrides};
use crate::domain::{Config, Strategy};
use crate::fetch::install_interrupt_handler;
use crate::github::GitHubClient;
use crate::pipeline::Pipeline;
use crate::render::render_summary;

#[derive(Args)]
pub struct CrawlArgs {
    /// Repository to crawl (OWNER/REPO or GitHub URL)
    #[arg(value_name = "REPO")]
    pub repo: Option<String>,

    /// Config file path (default: auto-discover issue-hook.toml/.yml in the working directory)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Association strategy: remote (API queries) or local (clone and scan history)
    #[arg(short = 's', long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Shorthand for --strategy local
    #[arg(long, conflicts_with = "strategy")]
    pub local_clone: bool,

    /// Worker threads for the local strategy (1-64)
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Branch a change must be merged into (default: the repository's default branch)
    #[arg(short = 'b', long, value_name = "BRANCH")]
    pub default_branch: Option<String>,

    /// Directory that receives the run artifact
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Process at most this many closed issues
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Clone from this URL instead of github.com
    #[arg(long, value_name = "URL")]
    pub clone_url: Option<String>,

    /// Try a shallow clone of this depth first
    #[arg(long, value_name = "DEPTH")]
    pub clone_depth: Option<u32>,

    /// Parent directory for the temporary clone
    #[arg(long, value_name = "DIR")]
    pub snapshot_root: Option<PathBuf>,

    /// Skip the full-text search query (remote strategy)
    #[arg(long)]
    pub no_search: bool,

    /// Do not ask the API when the local history has no references
    #[arg(long)]
    pub no_local_fallback: bool,

    /// Resolve changes even for issues that cannot qualify
    #[arg(long)]
    pub resolve_unqualifiable: bool,

    /// File with the classification criteria
    #[arg(long, value_name = "FILE")]
    pub criteria: Option<PathBuf>,

    /// Model used for classification
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API key for the classification service
    #[arg(long, env = "FORGE_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
}

impl CrawlArgs {
    fn overrides(&self) -> Result<CliOverrides> {
        let strategy = if self.local_clone {
            Some(Strategy::Local)
        } else {
            self.strategy.as_deref().map(str::parse::<Strategy>).transpose()?
        };
        Ok(CliOverrides {
            repo: self.repo.clone(),
            strategy,
            workers: self.workers,
            default_branch: self.default_branch.clone(),
            output_dir: self.output_dir.clone(),
            clone_url: self.clone_url.clone(),
            clone_depth: self.clone_depth,
            snapshot_root: self.snapshot_root.clone(),
            limit: self.limit,
            criteria_path: self.criteria.clone(),
            model: self.model.clone(),
            no_search: self.no_search,
            no_local_fallback: self.no_local_fallback,
            resolve_unqualifiable: self.resolve_unqualifiable,
            github_token: self.token.clone(),
            llm_api_key: self.llm_api_key.clone(),
        })
    }
}

/// Load file and environment config, then apply the command line.
pub fn resolve_config(config_path: Option<&std::path::Path>, overrides: CliOverrides) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    let file_config = load_config(&cwd, config_path)?;
    let env_config = apply_env_overrides(file_config)?;
    Ok(merge_cli_with_config(env_config, overrides))
}

pub fn run(args: CrawlArgs, quiet: bool) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), args.overrides()?)?;
    config.validate()?;
    let slug = config.repo_slug()?;

    let criteria = prompt::load_criteria(config.criteria_path.as_deref())?;
    let judge = ChatJudge::new(&config, &criteria)?;

    if config.strategy == Strategy::Local {
        install_interrupt_handler()?;
    }

    let service = GitHubClient::new(&config, slug.clone())?;
    let outcome = Pipeline::new(config, slug, Arc::new(service), Arc::new(judge)).show_progress(!quiet).run()?;

    if !quiet {
        println!("{}", render_summary(&outcome.result, &outcome.path));
    } else {
        println!("{}", outcome.path.display());
    }
    Ok(())
}
