//! Backends for issue persistence.

pub mod issues;

pub use issues::{
    HttpIssueService, InMemoryIssueService, IssueService, IssueServiceError, IssueServiceResult,
    sample_issues,
};
