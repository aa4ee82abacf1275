//! Issue entity shared by the board, the CRUD service boundary and the
//! voice dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier reserved for an issue that has never been persisted.
pub const DRAFT_ISSUE_ID: i64 = 0;

/// Workflow status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IssueStatus {
    /// Wire value of the status.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }

    /// Parse the wire value. Matching is exact, as the tool schema
    /// advertises the upper-case values only.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "IN_PROGRESS" => Some(Self::InProgress),
            "RESOLVED" => Some(Self::Resolved),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }

    /// All statuses in display order.
    pub fn all() -> &'static [IssueStatus] {
        &[Self::Open, Self::InProgress, Self::Resolved, Self::Closed]
    }

    /// Human label, e.g. "In Progress".
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked issue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Issue {
    /// Identifier; [`DRAFT_ISSUE_ID`] until the service assigns one
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub assignee: String,
}

impl Issue {
    /// Blank issue for the create flow.
    pub fn draft() -> Self {
        Self {
            id: DRAFT_ISSUE_ID,
            status: IssueStatus::Open,
            ..Default::default()
        }
    }

    /// Whether this issue has never been persisted.
    #[inline]
    pub fn is_draft(&self) -> bool {
        self.id == DRAFT_ISSUE_ID
    }
}

/// Partial update of an issue. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.assignee.is_none()
    }

    /// Overwrite the present fields on `issue`.
    pub fn apply_to(&self, issue: &mut Issue) {
        if let Some(ref title) = self.title {
            issue.title = title.clone();
        }
        if let Some(ref description) = self.description {
            issue.description = description.clone();
        }
        if let Some(status) = self.status {
            issue.status = status;
        }
        if let Some(ref assignee) = self.assignee {
            issue.assignee = assignee.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");

        let parsed: IssueStatus = serde_json::from_str("\"RESOLVED\"").unwrap();
        assert_eq!(parsed, IssueStatus::Resolved);
    }

    #[test]
    fn test_status_parse_is_exact() {
        assert_eq!(IssueStatus::parse("CLOSED"), Some(IssueStatus::Closed));
        assert_eq!(IssueStatus::parse("closed"), None);
        assert_eq!(IssueStatus::parse("DONE"), None);
    }

    #[test]
    fn test_draft() {
        let draft = Issue::draft();
        assert!(draft.is_draft());
        assert_eq!(draft.status, IssueStatus::Open);
        assert!(draft.title.is_empty());
    }

    #[test]
    fn test_update_touches_only_present_fields() {
        let mut issue = Issue {
            id: 7,
            title: "Old".to_string(),
            description: "Keep me".to_string(),
            status: IssueStatus::Open,
            assignee: "alice".to_string(),
        };
        let update = IssueUpdate {
            title: Some("New title".to_string()),
            status: Some(IssueStatus::Closed),
            ..Default::default()
        };

        update.apply_to(&mut issue);

        assert_eq!(issue.title, "New title");
        assert_eq!(issue.status, IssueStatus::Closed);
        assert_eq!(issue.description, "Keep me");
        assert_eq!(issue.assignee, "alice");
    }

    #[test]
    fn test_update_serializes_sparse() {
        let update = IssueUpdate {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "title": "New title" })
        );
        assert!(IssueUpdate::default().is_empty());
    }
}
