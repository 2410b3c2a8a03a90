//! Shared CLI utilities.

use crate::domain::RepoSlug;
use anyhow::{Context, Result};

/// Parse an issue reference into repository and number.
///
/// Accepts `owner/repo#123`, an issue or pull request URL
/// (`https://github.com/owner/repo/issues/123`, `.../pull/123`), or
/// `owner/repo` with the number given separately.
pub fn parse_issue_ref(target: &str, number: Option<u64>) -> Result<(RepoSlug, u64)> {
    let target = target.trim();

    if let Some(rest) = target.strip_prefix("https://github.com/").or_else(|| target.strip_prefix("http://github.com/")) {
        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        if let [owner, name, "issues" | "pull", n, ..] = parts.as_slice() {
            let slug: RepoSlug = format!("{owner}/{name}").parse()?;
            let n = parse_number(n)?;
            return Ok((slug, n));
        }
        anyhow::bail!("Not an issue URL: {target}");
    }

    if let Some((repo, n)) = target.split_once('#') {
        return Ok((repo.parse()?, parse_number(n)?));
    }

    let n = number.context("Missing issue number (use OWNER/REPO#N or pass the number separately)")?;
    Ok((target.parse()?, n))
}

fn parse_number(raw: &str) -> Result<u64> {
    let n: u64 = raw.trim().parse().with_context(|| format!("Invalid issue number '{raw}'"))?;
    if n == 0 {
        anyhow::bail!("Issue numbers start at 1");
    }
    Ok(n)
}
