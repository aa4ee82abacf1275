//! The CRUD boundary of the issue board.
//!
//! # API Reference
//!
//! The HTTP backend speaks the endpoint convention of the issue server:
//! every method is `POST {base}/IssuesService/{method}` with the arguments as
//! a JSON object of named parameters.
//!
//! - `findAll` `{}` -> `[Issue]`
//! - `findByAssignee` `{"assignee": ...}` -> `[Issue]`
//! - `update` `{"issue": Issue}` -> `Issue` (creates when `id` is 0)
//! - `delete` `{"id": ...}` -> empty

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::issue::{DRAFT_ISSUE_ID, Issue, IssueStatus};

/// Endpoint name segment of the issue service.
const SERVICE_NAME: &str = "IssuesService";

/// Errors from an [`IssueService`].
#[derive(Debug, Error)]
pub enum IssueServiceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Issue service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Issue {0} not found")]
    NotFound(i64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for issue service calls.
pub type IssueServiceResult<T> = Result<T, IssueServiceError>;

/// Issue persistence.
#[async_trait]
pub trait IssueService: Send + Sync {
    async fn find_all(&self) -> IssueServiceResult<Vec<Issue>>;

    async fn find_by_assignee(&self, assignee: &str) -> IssueServiceResult<Vec<Issue>>;

    /// Persist `issue` and return the stored version. An issue with id 0 is
    /// created and receives a fresh id.
    async fn update(&self, issue: Issue) -> IssueServiceResult<Issue>;

    async fn delete(&self, id: i64) -> IssueServiceResult<()>;
}

// =============================================================================
// HTTP
// =============================================================================

/// JSON-over-HTTP client for the issue server.
#[derive(Debug, Clone)]
pub struct HttpIssueService {
    http_client: Client,
    base_url: String,
}

impl HttpIssueService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, SERVICE_NAME, method)
    }

    async fn call(&self, method: &str, params: Value) -> IssueServiceResult<String> {
        let url = self.method_url(method);
        tracing::debug!("Calling {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| IssueServiceError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IssueServiceError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(IssueServiceError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> IssueServiceResult<T> {
        let body = self.call(method, params).await?;
        serde_json::from_str(&body)
            .map_err(|e| IssueServiceError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl IssueService for HttpIssueService {
    async fn find_all(&self) -> IssueServiceResult<Vec<Issue>> {
        self.call_json("findAll", json!({})).await
    }

    async fn find_by_assignee(&self, assignee: &str) -> IssueServiceResult<Vec<Issue>> {
        self.call_json("findByAssignee", json!({ "assignee": assignee }))
            .await
    }

    async fn update(&self, issue: Issue) -> IssueServiceResult<Issue> {
        self.call_json("update", json!({ "issue": issue })).await
    }

    async fn delete(&self, id: i64) -> IssueServiceResult<()> {
        self.call("delete", json!({ "id": id })).await.map(|_| ())
    }
}

// =============================================================================
// In-Memory
// =============================================================================

struct Store {
    issues: Vec<Issue>,
    next_id: i64,
}

/// Process-local issue store.
pub struct InMemoryIssueService {
    store: Mutex<Store>,
}

impl Default for InMemoryIssueService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIssueService {
    pub fn new() -> Self {
        Self::with_issues(Vec::new())
    }

    /// Seed the store. New ids continue after the highest seeded id.
    pub fn with_issues(issues: Vec<Issue>) -> Self {
        let next_id = issues.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        Self {
            store: Mutex::new(Store { issues, next_id }),
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IssueService for InMemoryIssueService {
    async fn find_all(&self) -> IssueServiceResult<Vec<Issue>> {
        Ok(self.store.lock().issues.clone())
    }

    /// Assignee names match case-insensitively.
    async fn find_by_assignee(&self, assignee: &str) -> IssueServiceResult<Vec<Issue>> {
        let wanted = assignee.trim().to_lowercase();
        Ok(self
            .store
            .lock()
            .issues
            .iter()
            .filter(|issue| issue.assignee.to_lowercase() == wanted)
            .cloned()
            .collect())
    }

    async fn update(&self, mut issue: Issue) -> IssueServiceResult<Issue> {
        let mut store = self.store.lock();
        if issue.id == DRAFT_ISSUE_ID {
            issue.id = store.next_id;
            store.next_id += 1;
            store.issues.push(issue.clone());
            return Ok(issue);
        }

        let slot = store
            .issues
            .iter_mut()
            .find(|existing| existing.id == issue.id)
            .ok_or(IssueServiceError::NotFound(issue.id))?;
        *slot = issue.clone();
        Ok(issue)
    }

    async fn delete(&self, id: i64) -> IssueServiceResult<()> {
        let mut store = self.store.lock();
        let before = store.issues.len();
        store.issues.retain(|issue| issue.id != id);
        if store.issues.len() == before {
            return Err(IssueServiceError::NotFound(id));
        }
        Ok(())
    }
}

/// A small fixed data set for demos.
pub fn sample_issues() -> Vec<Issue> {
    let issue = |id, title: &str, description: &str, status, assignee: &str| Issue {
        id,
        title: title.to_string(),
        description: description.to_string(),
        status,
        assignee: assignee.to_string(),
    };
    vec![
        issue(1, "Login page times out", "Session expires after 30 seconds", IssueStatus::Open, "Alice"),
        issue(2, "Broken export", "CSV export drops the last row", IssueStatus::InProgress, "Bob"),
        issue(3, "Typo on landing page", "'Recieve' should be 'Receive'", IssueStatus::Resolved, "Alice"),
        issue(4, "Dark mode contrast", "Secondary text is unreadable", IssueStatus::Open, "Carol"),
    ]
}
