//! Check command: walk one issue through every stage and report each step.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use super::crawl::resolve_config;
use super::utils::parse_issue_ref;
use crate::associate::{select_resolver, AssociationResolver, Resolution};
use crate::classify::{self, prompt, ChatJudge, IssueJudge};
use crate::config::CliOverrides;
use crate::domain::{Strategy, Verdict};
use crate::github::{GitHubClient, RepositoryService};
use crate::qualify;

#[derive(Args)]
pub struct CheckArgs {
    /// Issue reference: OWNER/REPO#N, an issue or pull request URL, or OWNER/REPO followed by N
    #[arg(value_name = "ISSUE")]
    pub target: String,

    /// Issue number when ISSUE is just OWNER/REPO
    #[arg(value_name = "NUMBER")]
    pub number: Option<u64>,

    /// Config file path
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Branch a change must be merged into
    #[arg(short = 'b', long, value_name = "BRANCH")]
    pub default_branch: Option<String>,

    /// Skip the full-text search query
    #[arg(long)]
    pub no_search: bool,

    /// Stop after qualification
    #[arg(long)]
    pub no_classify: bool,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API key for the classification service
    #[arg(long, env = "FORGE_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStep {
    pub label: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckStep {
    fn new(label: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self { label, passed, detail: detail.into() }
    }

    fn render(&self) -> String {
        let mark = if self.passed { style("✓").green() } else { style("✗").red() };
        format!("  {} {}: {}", mark, self.label, self.detail)
    }
}

pub fn run(args: CheckArgs) -> Result<()> {
    let (slug, number) = parse_issue_ref(&args.target, args.number)?;
    let overrides = CliOverrides {
        repo: Some(slug.to_string()),
        strategy: Some(Strategy::Remote),
        default_branch: args.default_branch.clone(),
        no_search: args.no_search,
        github_token: args.token.clone(),
        llm_api_key: args.llm_api_key.clone(),
        ..CliOverrides::default()
    };
    let config = resolve_config(args.config.as_deref(), overrides)?;
    config.validate()?;

    let judge = if args.no_classify {
        None
    } else {
        let criteria = prompt::load_criteria(config.criteria_path.as_deref())?;
        Some(ChatJudge::new(&config, &criteria)?)
    };

    println!("{} {}#{}", style("Checking").bold(), slug, number);
    let service: Arc<dyn RepositoryService> = Arc::new(GitHubClient::new(&config, slug)?);
    let resolver = select_resolver(&config, service.clone(), None)?;
    let steps = check_issue(
        service.as_ref(),
        |n| resolver.resolve(n),
        judge.as_ref().map(|j| j as &dyn IssueJudge),
        number,
        config.default_branch.as_deref(),
    )?;

    for step in &steps {
        println!("{}", step.render());
    }
    let qualifies = steps.iter().find(|s| s.label == "qualifies").is_some_and(|s| s.passed);
    println!("{}", if qualifies { style("Issue qualifies").green().bold() } else { style("Issue does not qualify").yellow().bold() });
    Ok(())
}

/// Run each stage for `number`, stopping at the first one that rules the issue out.
pub fn check_issue<R>(
    service: &dyn RepositoryService,
    resolve: R,
    judge: Option<&dyn IssueJudge>,
    number: u64,
    branch_override: Option<&str>,
) -> Result<Vec<CheckStep>>
where
    R: Fn(u64) -> Result<Resolution>,
{
    let mut steps = Vec::new();

    let issue = service.get_issue(number)?;
    steps.push(CheckStep::new("fetched", true, issue.title.clone()));

    if let Some(reason) = qualify::disqualifier(&issue) {
        let label = if issue.is_closed() { "has description" } else { "closed" };
        steps.push(CheckStep::new(label, false, reason));
        return Ok(steps);
    }
    steps.push(CheckStep::new("closed", true, "yes"));
    steps.push(CheckStep::new("has description", true, format!("{} characters", issue.body.trim().chars().count())));

    let default_branch = match branch_override {
        Some(branch) => branch.to_string(),
        None => service.default_branch()?,
    };

    let resolution = resolve(number)?;
    let numbers: Vec<String> = resolution.changes.iter().map(|c| format!("#{}", c.number)).collect();
    let detail = if numbers.is_empty() { "none found".to_string() } else { numbers.join(", ") };
    steps.push(CheckStep::new("associated changes", !resolution.changes.is_empty(), detail));
    for note in &resolution.notes {
        steps.push(CheckStep::new("note", false, note.clone()));
    }

    let record = qualify::qualify(&issue, resolution.changes, &default_branch);
    let merged: Vec<String> = record
        .changes
        .iter()
        .filter(|c| c.is_merged_into(&default_branch))
        .map(|c| format!("#{}", c.number))
        .collect();
    let detail = if merged.is_empty() { format!("none merged into {default_branch}") } else { merged.join(", ") };
    steps.push(CheckStep::new("merged into default branch", record.has_merged_default_branch_change, detail));
    steps.push(CheckStep::new("qualifies", record.qualifying, if record.qualifying { "yes" } else { "no" }));

    if let (true, Some(judge)) = (record.qualifying, judge) {
        let verdict = classify::classify_all(judge, &[&issue]).into_iter().next();
        if let Some(verdict) = verdict {
            let detail = match verdict.verdict {
                Verdict::Unknown => verdict.failure.unwrap_or_default(),
                _ => verdict.rationale,
            };
            steps.push(CheckStep::new("agent issue", verdict.verdict == Verdict::Yes, detail));
        }
    }
    Ok(steps)
}
