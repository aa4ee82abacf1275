//! Function-call dispatch for the voice session.
//!
//! The realtime model reports a finished tool invocation with a
//! `response.function_call_arguments.done` event. The dispatcher validates
//! the call against the view as it is *now*, invokes the matching
//! [`IssueActions`] method and answers with exactly one
//! `function_call_output` acknowledgement carrying the call id.
//!
//! # Freshness
//!
//! The action set and the view snapshot live in two indirection cells
//! (`ArcSwap`) owned by a [`DispatchHandle`]. The view layer replaces their
//! contents whenever its callbacks or state change; the dispatcher loads them
//! only when an event is handled, never when the session starts.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::messages::{ClientEvent, FunctionCallArgumentsDone};
use super::tools::VoiceTool;
use crate::core::issue::{Issue, IssueStatus, IssueUpdate};
use crate::core::realtime::base::{DataChannel, RealtimeResult};

// =============================================================================
// Action Callback Set
// =============================================================================

/// The CRUD operations a voice command may trigger.
///
/// Implemented by the view layer; the dispatcher only calls these after the
/// call's precondition holds.
#[async_trait]
pub trait IssueActions: Send + Sync {
    async fn filter_by_assignee(&self, assignee: String);

    async fn show_all(&self);

    async fn create_issue(&self);

    /// Delete the currently selected issue.
    async fn delete_issue(&self);

    async fn select_issue(&self, id: i64);

    /// Apply `updates` to the issue with `id`. Only present fields change.
    async fn update_issue(&self, id: i64, updates: IssueUpdate);
}

/// The list and selection the view currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub issues: Vec<Issue>,
    pub selected: Option<Issue>,
}

impl ViewSnapshot {
    pub fn contains(&self, id: i64) -> bool {
        self.issues.iter().any(|issue| issue.id == id)
    }
}

/// Writer side of the view cell, handed to the view layer.
#[derive(Clone)]
pub struct ViewPublisher {
    view: Arc<ArcSwap<ViewSnapshot>>,
}

impl ViewPublisher {
    /// A publisher with its own cell, for view layers created before the
    /// dispatch handle.
    pub fn new(snapshot: ViewSnapshot) -> Self {
        Self {
            view: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// Replace the snapshot seen by subsequent dispatches.
    pub fn publish(&self, snapshot: ViewSnapshot) {
        self.view.store(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<ViewSnapshot> {
        self.view.load_full()
    }
}

/// Shared, always-current action set and view snapshot.
#[derive(Clone)]
pub struct DispatchHandle {
    actions: Arc<ArcSwap<Arc<dyn IssueActions>>>,
    view: Arc<ArcSwap<ViewSnapshot>>,
}

impl DispatchHandle {
    pub fn new(actions: Arc<dyn IssueActions>, view: ViewSnapshot) -> Self {
        Self {
            actions: Arc::new(ArcSwap::from_pointee(actions)),
            view: Arc::new(ArcSwap::from_pointee(view)),
        }
    }

    /// A handle reading the view from an existing publisher's cell.
    pub fn with_view(actions: Arc<dyn IssueActions>, view: &ViewPublisher) -> Self {
        Self {
            actions: Arc::new(ArcSwap::from_pointee(actions)),
            view: view.view.clone(),
        }
    }

    /// Swap in a new action set.
    pub fn replace_actions(&self, actions: Arc<dyn IssueActions>) {
        self.actions.store(Arc::new(actions));
    }

    pub fn publish_view(&self, snapshot: ViewSnapshot) {
        self.view.store(Arc::new(snapshot));
    }

    /// A writer for the view cell only.
    pub fn view_publisher(&self) -> ViewPublisher {
        ViewPublisher {
            view: self.view.clone(),
        }
    }

    pub fn actions(&self) -> Arc<dyn IssueActions> {
        let guard = self.actions.load();
        Arc::clone(&**guard)
    }

    pub fn view(&self) -> Arc<ViewSnapshot> {
        self.view.load_full()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Why a recognized call did not invoke its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Delete/update without a selected issue
    NoSelection,
    /// `selectIssue` without a usable numeric id
    MissingId,
    /// `selectIssue` with an id absent from the current list
    UnknownIssue(i64),
}

/// What the dispatcher did with one function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Invoked(VoiceTool),
    Rejected(VoiceTool, Rejection),
    Unrecognized(String),
}

/// Routes completed function calls to the current action set.
#[derive(Clone)]
pub struct FunctionCallDispatcher {
    handle: DispatchHandle,
}

impl FunctionCallDispatcher {
    pub fn new(handle: DispatchHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &DispatchHandle {
        &self.handle
    }

    /// Route one call, then acknowledge it on `channel`.
    ///
    /// The acknowledgement is sent whether or not an action ran.
    pub async fn dispatch(
        &self,
        call: &FunctionCallArgumentsDone,
        channel: &dyn DataChannel,
    ) -> RealtimeResult<DispatchOutcome> {
        let outcome = self.route(call).await;

        match &outcome {
            DispatchOutcome::Invoked(tool) => {
                tracing::info!("Voice command {} (call_id={})", tool, call.call_id);
            }
            DispatchOutcome::Rejected(tool, reason) => {
                tracing::debug!(
                    "Voice command {} skipped: {:?} (call_id={})",
                    tool,
                    reason,
                    call.call_id
                );
            }
            DispatchOutcome::Unrecognized(name) => {
                tracing::debug!("Ignoring unknown function '{}' (call_id={})", name, call.call_id);
            }
        }

        let ack = ClientEvent::function_call_ack(call.call_id.clone()).to_json()?;
        channel.send_text(&ack).await?;

        Ok(outcome)
    }

    async fn route(&self, call: &FunctionCallArgumentsDone) -> DispatchOutcome {
        let Some(tool) = VoiceTool::parse(&call.name) else {
            return DispatchOutcome::Unrecognized(call.name.clone());
        };

        let args = parse_arguments(&call.arguments);
        // Loaded per call so UI-side changes since session start are honored
        let actions = self.handle.actions();
        let view = self.handle.view();

        match tool {
            VoiceTool::FilterByAssignee => {
                let assignee = args
                    .get("assignee")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                actions.filter_by_assignee(assignee).await;
            }
            VoiceTool::ShowAllIssues => actions.show_all().await,
            VoiceTool::CreateNewIssue => actions.create_issue().await,
            VoiceTool::DeleteCurrentIssue => {
                if view.selected.is_none() {
                    return DispatchOutcome::Rejected(tool, Rejection::NoSelection);
                }
                actions.delete_issue().await;
            }
            VoiceTool::SelectIssue => {
                let Some(id) = args.get("id").and_then(issue_id) else {
                    return DispatchOutcome::Rejected(tool, Rejection::MissingId);
                };
                if !view.contains(id) {
                    return DispatchOutcome::Rejected(tool, Rejection::UnknownIssue(id));
                }
                actions.select_issue(id).await;
            }
            VoiceTool::UpdateIssue => {
                let Some(selected) = view.selected.as_ref() else {
                    return DispatchOutcome::Rejected(tool, Rejection::NoSelection);
                };
                actions.update_issue(selected.id, partial_update(&args)).await;
            }
        }

        DispatchOutcome::Invoked(tool)
    }
}

/// Decode the argument string; anything but a JSON object becomes `{}`.
fn parse_arguments(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!("Function call arguments are not an object: {}", other);
            Map::new()
        }
        Err(e) => {
            tracing::warn!("Malformed function call arguments: {} - {}", e, raw);
            Map::new()
        }
    }
}

/// Integer ids, or floats without a fractional part.
fn issue_id(value: &Value) -> Option<i64> {
    if let Some(id) = value.as_i64() {
        return Some(id);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Collect the present, non-empty fields of an `updateIssue` call.
fn partial_update(args: &Map<String, Value>) -> IssueUpdate {
    let text = |key: &str| {
        args.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let status = text("status").and_then(|s| {
        let parsed = IssueStatus::parse(&s);
        if parsed.is_none() {
            tracing::warn!("Ignoring unknown issue status '{}'", s);
        }
        parsed
    });

    IssueUpdate {
        title: text("title"),
        description: text("description"),
        status,
        assignee: text("assignee"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments_tolerates_garbage() {
        assert!(parse_arguments("").is_empty());
        assert!(parse_arguments("{not json").is_empty());
        assert!(parse_arguments("[1, 2]").is_empty());
        assert_eq!(parse_arguments(r#"{"id": 4}"#)["id"], json!(4));
    }

    #[test]
    fn test_issue_id_accepts_whole_numbers_only() {
        assert_eq!(issue_id(&json!(7)), Some(7));
        assert_eq!(issue_id(&json!(7.0)), Some(7));
        assert_eq!(issue_id(&json!(7.5)), None);
        assert_eq!(issue_id(&json!("7")), None);
        assert_eq!(issue_id(&json!(null)), None);
    }

    #[test]
    fn test_partial_update_only_present_fields() {
        let args = parse_arguments(r#"{"title": "New title"}"#);
        let update = partial_update(&args);
        assert_eq!(
            update,
            IssueUpdate {
                title: Some("New title".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_partial_update_drops_empty_and_invalid() {
        let args = parse_arguments(
            r#"{"title": "", "status": "DONE", "assignee": "bob", "description": 42}"#,
        );
        let update = partial_update(&args);
        assert_eq!(update.title, None);
        assert_eq!(update.status, None);
        assert_eq!(update.description, None);
        assert_eq!(update.assignee.as_deref(), Some("bob"));
    }

    #[test]
    fn test_partial_update_status() {
        let args = parse_arguments(r#"{"status": "IN_PROGRESS"}"#);
        assert_eq!(partial_update(&args).status, Some(IssueStatus::InProgress));
    }

    #[test]
    fn test_view_contains() {
        let view = ViewSnapshot {
            issues: vec![Issue {
                id: 3,
                ..Issue::draft()
            }],
            selected: None,
        };
        assert!(view.contains(3));
        assert!(!view.contains(4));
    }
}
