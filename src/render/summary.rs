//! Human-readable end-of-run summary.

use crate::domain::{RunResult, Verdict};
use console::style;
use std::path::Path;

pub fn render_summary(result: &RunResult, artifact: &Path) -> String {
    let unknown = result
        .issues
        .iter()
        .filter(|r| r.classification.as_ref().is_some_and(|v| v.verdict == Verdict::Unknown))
        .count();

    let mut lines = vec![
        format!("{} {}", style("Repository:").bold(), result.repo),
        format!("  strategy:        {}", result.strategy),
        format!("  default branch:  {}", result.default_branch),
        format!("  closed issues:   {}", result.total_count),
        format!("  qualifying:      {}", result.qualifying_count),
        format!("  agent issues:    {}", style(result.positive_count).green()),
    ];
    if unknown > 0 {
        lines.push(format!("  unclassified:    {}", style(unknown).yellow()));
    }
    lines.push(format!("{} {}", style("Saved to").bold(), artifact.display()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::issue;
    use crate::domain::{ClassificationVerdict, IssueRecord, IssueState, QualificationRecord, RepoSlug, Strategy};

    #[test]
    fn mentions_counts_and_unclassified() {
        let mut record = IssueRecord::new(
            issue(10, IssueState::Closed, "body"),
            QualificationRecord { qualifying: true, ..Default::default() },
        );
        record.classification = Some(ClassificationVerdict::unknown("timeout"));
        let slug: RepoSlug = "acme/widgets".parse().unwrap();
        let result = RunResult::new(&slug, Strategy::Remote, "main", vec![record]);

        let text = console::strip_ansi_codes(&render_summary(&result, Path::new("out/issue.json"))).to_string();
        assert!(text.contains("acme/widgets"));
        assert!(text.contains("qualifying:      1"));
        assert!(text.contains("unclassified:    1"));
        assert!(text.ends_with("out/issue.json"));
    }
}
