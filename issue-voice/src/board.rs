//! Headless issue board.
//!
//! [`IssueBoard`] is the view-model behind the issue list: it owns the list
//! currently shown, the selection (the issue open in the edit form) and the
//! active assignee filter. Every state change republishes a
//! [`ViewSnapshot`], so a voice session dispatching against the board's
//! [`DispatchHandle`] always validates against what is on screen.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::issue::{Issue, IssueUpdate};
use crate::core::realtime::{DispatchHandle, IssueActions, ViewPublisher, ViewSnapshot};
use crate::services::{IssueService, IssueServiceResult};

#[derive(Debug, Default)]
struct BoardState {
    issues: Vec<Issue>,
    selected: Option<Issue>,
    filter: Option<String>,
}

/// List, selection and filter state on top of an [`IssueService`].
pub struct IssueBoard {
    service: Arc<dyn IssueService>,
    state: Mutex<BoardState>,
    view: ViewPublisher,
}

impl IssueBoard {
    pub fn new(service: Arc<dyn IssueService>) -> Arc<Self> {
        Arc::new(Self {
            service,
            state: Mutex::new(BoardState::default()),
            view: ViewPublisher::new(ViewSnapshot::default()),
        })
    }

    /// A dispatch handle whose actions act on this board and whose view
    /// follows it.
    pub fn dispatch_handle(self: &Arc<Self>) -> DispatchHandle {
        DispatchHandle::with_view(self.clone(), &self.view)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.lock();
        ViewSnapshot {
            issues: state.issues.clone(),
            selected: state.selected.clone(),
        }
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.state.lock().issues.clone()
    }

    pub fn selected(&self) -> Option<Issue> {
        self.state.lock().selected.clone()
    }

    /// Assignee the list is currently filtered by.
    pub fn filter(&self) -> Option<String> {
        self.state.lock().filter.clone()
    }

    /// Apply `f` and publish the resulting view.
    ///
    /// Publishing happens under the state lock so concurrent changes reach
    /// the view in the same order they were applied.
    fn modify<R>(&self, f: impl FnOnce(&mut BoardState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.view.publish(ViewSnapshot {
            issues: state.issues.clone(),
            selected: state.selected.clone(),
        });
        result
    }

    /// Show every issue.
    pub async fn load_all(&self) -> IssueServiceResult<()> {
        let issues = self.service.find_all().await?;
        tracing::debug!("Loaded {} issues", issues.len());
        self.modify(|state| {
            state.issues = issues;
            state.filter = None;
        });
        Ok(())
    }

    /// Show only the issues assigned to `assignee`.
    pub async fn filter_by_assignee(&self, assignee: &str) -> IssueServiceResult<()> {
        let issues = self.service.find_by_assignee(assignee).await?;
        tracing::debug!("{} issues assigned to '{}'", issues.len(), assignee);
        self.modify(|state| {
            state.issues = issues;
            state.filter = Some(assignee.to_string());
        });
        Ok(())
    }

    /// Open a blank draft in the form.
    pub fn create_draft(&self) {
        self.modify(|state| state.selected = Some(Issue::draft()));
    }

    /// Select the listed issue with `id`. Returns `false` if it is not listed.
    pub fn select(&self, id: i64) -> bool {
        self.modify(|state| {
            let found = state.issues.iter().find(|issue| issue.id == id).cloned();
            let listed = found.is_some();
            if listed {
                state.selected = found;
            }
            listed
        })
    }

    pub fn clear_selection(&self) {
        self.modify(|state| state.selected = None);
    }

    /// Delete the selected issue. A selected draft is discarded without
    /// contacting the service.
    pub async fn delete_selected(&self) -> IssueServiceResult<bool> {
        let Some(selected) = self.selected() else {
            return Ok(false);
        };

        if !selected.is_draft() {
            self.service.delete(selected.id).await?;
        }

        self.modify(|state| {
            state.issues.retain(|issue| issue.id != selected.id);
            state.selected = None;
        });
        tracing::info!("Deleted issue {}", selected.id);
        Ok(true)
    }

    /// Apply `update` to issue `id` and persist it.
    ///
    /// A draft only changes in the form; it is persisted by [`submit`].
    /// The issue stays selected.
    ///
    /// [`submit`]: IssueBoard::submit
    pub async fn update_selected(&self, id: i64, update: IssueUpdate) -> IssueServiceResult<()> {
        let current = {
            let state = self.state.lock();
            state
                .selected
                .iter()
                .chain(state.issues.iter())
                .find(|issue| issue.id == id)
                .cloned()
        };
        let Some(mut issue) = current else {
            tracing::warn!("Update for unknown issue {}", id);
            return Ok(());
        };

        update.apply_to(&mut issue);

        let stored = if issue.is_draft() {
            issue
        } else {
            self.service.update(issue).await?
        };

        self.modify(|state| {
            if let Some(slot) = state.issues.iter_mut().find(|i| i.id == stored.id) {
                *slot = stored.clone();
            }
            state.selected = Some(stored);
        });
        Ok(())
    }

    /// Persist the edited form contents and close the form.
    pub async fn submit(&self, issue: Issue) -> IssueServiceResult<Issue> {
        let stored = self.service.update(issue).await?;
        self.modify(|state| {
            match state.issues.iter_mut().find(|i| i.id == stored.id) {
                Some(slot) => *slot = stored.clone(),
                None => state.issues.push(stored.clone()),
            }
            state.selected = None;
        });
        tracing::info!("Saved issue {}", stored.id);
        Ok(stored)
    }
}

#[async_trait]
impl IssueActions for IssueBoard {
    async fn filter_by_assignee(&self, assignee: String) {
        if let Err(e) = IssueBoard::filter_by_assignee(self, &assignee).await {
            tracing::error!("Failed to filter issues by '{}': {}", assignee, e);
        }
    }

    async fn show_all(&self) {
        if let Err(e) = self.load_all().await {
            tracing::error!("Failed to load issues: {}", e);
        }
    }

    async fn create_issue(&self) {
        self.create_draft();
    }

    async fn delete_issue(&self) {
        if let Err(e) = self.delete_selected().await {
            tracing::error!("Failed to delete issue: {}", e);
        }
    }

    async fn select_issue(&self, id: i64) {
        if !self.select(id) {
            tracing::warn!("Issue {} is not listed", id);
        }
    }

    async fn update_issue(&self, id: i64, updates: IssueUpdate) {
        if let Err(e) = self.update_selected(id, updates).await {
            tracing::error!("Failed to update issue {}: {}", id, e);
        }
    }
}
