//! The qualification filter.
//!
//! An issue qualifies when it is closed, has a non-empty description and at
//! least one associated change was merged into the default branch.

use crate::domain::{AssociatedChange, Issue, QualificationRecord};

/// Why an issue can never qualify, whatever its changes. `None` if it still can.
pub fn disqualifier(issue: &Issue) -> Option<&'static str> {
    if !issue.is_closed() {
        Some("issue is not closed")
    } else if !issue.has_description() {
        Some("issue has no description")
    } else {
        None
    }
}

/// Apply the filter to one issue and the changes found for it.
pub fn qualify(issue: &Issue, changes: Vec<AssociatedChange>, default_branch: &str) -> QualificationRecord {
    let has_description = issue.has_description();
    let has_merged_default_branch_change = changes.iter().any(|c| c.is_merged_into(default_branch));
    QualificationRecord {
        has_description,
        has_merged_default_branch_change,
        qualifying: issue.is_closed() && has_description && has_merged_default_branch_change,
        changes,
        notes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::{change, issue};
    use crate::domain::{ChangeState, IssueState};

    #[test]
    fn merged_into_default_branch_qualifies() {
        let record = qualify(
            &issue(10, IssueState::Closed, "API key ignored by provider"),
            vec![change(11, ChangeState::Merged, "main", 10)],
            "main",
        );
        assert!(record.qualifying);
        assert!(record.has_description);
        assert!(record.has_merged_default_branch_change);
    }

    #[test]
    fn empty_description_never_qualifies() {
        let record = qualify(&issue(12, IssueState::Closed, ""), vec![change(13, ChangeState::Merged, "main", 12)], "main");
        assert!(!record.qualifying);
        assert!(!record.has_description);
        assert!(record.has_merged_default_branch_change);
    }

    #[test]
    fn open_issue_never_qualifies() {
        let record = qualify(&issue(13, IssueState::Open, "body"), vec![change(14, ChangeState::Merged, "main", 13)], "main");
        assert!(!record.qualifying);
    }

    #[test]
    fn change_merged_elsewhere_does_not_count() {
        let i = issue(20, IssueState::Closed, "body");
        let other_branch = qualify(&i, vec![change(21, ChangeState::Merged, "release/1.x", 20)], "main");
        assert!(!other_branch.qualifying);
        assert!(!other_branch.has_merged_default_branch_change);

        let closed_unmerged = qualify(&i, vec![change(22, ChangeState::Closed, "main", 20)], "main");
        assert!(!closed_unmerged.qualifying);

        let no_changes = qualify(&i, vec![], "main");
        assert!(!no_changes.qualifying);
    }

    #[test]
    fn one_matching_change_among_many_is_enough() {
        let record = qualify(
            &issue(30, IssueState::Closed, "body"),
            vec![
                change(31, ChangeState::Open, "main", 30),
                change(32, ChangeState::Merged, "dev", 30),
                change(33, ChangeState::Merged, "main", 30),
            ],
            "main",
        );
        assert!(record.qualifying);
        assert_eq!(record.changes.len(), 3);
    }

    #[test]
    fn disqualifier_names_the_reason() {
        assert_eq!(disqualifier(&issue(1, IssueState::Open, "body")), Some("issue is not closed"));
        assert_eq!(disqualifier(&issue(1, IssueState::Closed, "  ")), Some("issue has no description"));
        assert_eq!(disqualifier(&issue(1, IssueState::Closed, "body")), None);
    }
}
