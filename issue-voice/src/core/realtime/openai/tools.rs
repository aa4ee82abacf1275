//! Tool schema advertised to the realtime model.
//!
//! The six voice tools map one-to-one onto the board's CRUD actions. The
//! declaration is sent as a `session.update` event as soon as the control
//! channel opens, once per session.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;

use super::messages::{ClientEvent, SessionConfig, ToolDef};
use crate::core::issue::IssueStatus;
use crate::core::realtime::base::{DataChannel, RealtimeResult};

/// Functions the realtime model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceTool {
    FilterByAssignee,
    ShowAllIssues,
    CreateNewIssue,
    DeleteCurrentIssue,
    SelectIssue,
    UpdateIssue,
}

impl VoiceTool {
    /// Function name on the wire.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilterByAssignee => "filterByAssignee",
            Self::ShowAllIssues => "showAllIssues",
            Self::CreateNewIssue => "createNewIssue",
            Self::DeleteCurrentIssue => "deleteCurrentIssue",
            Self::SelectIssue => "selectIssue",
            Self::UpdateIssue => "updateIssue",
        }
    }

    /// Resolve a function name. Names are case-sensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "filterByAssignee" => Some(Self::FilterByAssignee),
            "showAllIssues" => Some(Self::ShowAllIssues),
            "createNewIssue" => Some(Self::CreateNewIssue),
            "deleteCurrentIssue" => Some(Self::DeleteCurrentIssue),
            "selectIssue" => Some(Self::SelectIssue),
            "updateIssue" => Some(Self::UpdateIssue),
            _ => None,
        }
    }

    pub fn all() -> &'static [VoiceTool] {
        &[
            Self::FilterByAssignee,
            Self::ShowAllIssues,
            Self::CreateNewIssue,
            Self::DeleteCurrentIssue,
            Self::SelectIssue,
            Self::UpdateIssue,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FilterByAssignee => "Filter issues by assignee name",
            Self::ShowAllIssues => "Show all issues without filtering",
            Self::CreateNewIssue => "Create a new issue",
            Self::DeleteCurrentIssue => "Delete the currently selected issue",
            Self::SelectIssue => "Select an issue by its ID number",
            Self::UpdateIssue => "Update the currently selected issue with new values",
        }
    }

    /// JSON schema of the parameters, `None` for parameterless tools.
    pub fn parameters(&self) -> Option<serde_json::Value> {
        match self {
            Self::FilterByAssignee => Some(json!({
                "type": "object",
                "properties": {
                    "assignee": {
                        "type": "string",
                        "description": "Name of the assignee to filter by"
                    }
                },
                "required": ["assignee"]
            })),
            Self::SelectIssue => Some(json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "number",
                        "description": "The ID of the issue to select"
                    }
                },
                "required": ["id"]
            })),
            Self::UpdateIssue => {
                let statuses: Vec<&str> = IssueStatus::all().iter().map(|s| s.as_str()).collect();
                Some(json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "New title for the issue" },
                        "description": {
                            "type": "string",
                            "description": "New description for the issue"
                        },
                        "status": {
                            "type": "string",
                            "description": "New status for the issue",
                            "enum": statuses
                        },
                        "assignee": { "type": "string", "description": "New assignee for the issue" }
                    },
                    "minProperties": 1
                }))
            }
            Self::ShowAllIssues | Self::CreateNewIssue | Self::DeleteCurrentIssue => None,
        }
    }

    pub fn definition(&self) -> ToolDef {
        ToolDef {
            tool_type: "function".to_string(),
            name: self.as_str().to_string(),
            description: Some(self.description().to_string()),
            parameters: self.parameters(),
        }
    }
}

impl std::fmt::Display for VoiceTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarations for every voice tool, in advertisement order.
pub fn tool_definitions() -> Vec<ToolDef> {
    VoiceTool::all().iter().map(VoiceTool::definition).collect()
}

/// Optional extras carried by the session declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// System instructions for the model
    pub instructions: Option<String>,
    /// Output voice
    pub voice: Option<String>,
}

/// Build the `session.update` event declaring the voice tools.
pub fn session_update_event(options: &SessionOptions) -> ClientEvent {
    ClientEvent::SessionUpdate {
        session: SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: options.instructions.clone(),
            voice: options.voice.clone(),
            tools: Some(tool_definitions()),
        },
    }
}

/// Sends the tool declaration at most once over a session's control channel.
///
/// A publisher belongs to exactly one session; a new session builds a new
/// publisher, so the declaration is re-sent for every session.
#[derive(Debug)]
pub struct ToolSchemaPublisher {
    payload: String,
    published: AtomicBool,
}

impl ToolSchemaPublisher {
    pub fn new(options: &SessionOptions) -> RealtimeResult<Self> {
        let payload = session_update_event(options).to_json()?;
        Ok(Self {
            payload,
            published: AtomicBool::new(false),
        })
    }

    /// Send the declaration unless it was already sent.
    ///
    /// Returns `true` when this call sent it.
    pub async fn publish(&self, channel: &dyn DataChannel) -> RealtimeResult<bool> {
        if self.published.swap(true, Ordering::SeqCst) {
            tracing::debug!("Tool schema already published on '{}'", channel.label());
            return Ok(false);
        }

        if let Err(e) = channel.send_text(&self.payload).await {
            // Not sent, so a later publish may try again
            self.published.store(false, Ordering::SeqCst);
            return Err(e);
        }

        tracing::info!(
            "Published {} voice tools on '{}'",
            VoiceTool::all().len(),
            channel.label()
        );
        Ok(true)
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::SeqCst)
    }

    /// The serialized `session.update` event.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::base::RealtimeError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl DataChannel for RecordingChannel {
        fn label(&self) -> &str {
            "oai-events"
        }

        async fn send_text(&self, text: &str) -> RealtimeResult<()> {
            if self.fail {
                return Err(RealtimeError::DataChannelError("closed".to_string()));
            }
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_tool_names_round_trip() {
        for tool in VoiceTool::all() {
            assert_eq!(VoiceTool::parse(tool.as_str()), Some(*tool));
        }
        assert_eq!(VoiceTool::parse("FilterByAssignee"), None);
        assert_eq!(VoiceTool::parse("dropDatabase"), None);
    }

    #[test]
    fn test_session_update_shape() {
        let event = session_update_event(&SessionOptions::default());
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["modalities"], json!(["text", "audio"]));
        assert!(value["session"].get("instructions").is_none());
        assert!(value["session"].get("voice").is_none());

        let tools = value["session"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![
                "filterByAssignee",
                "showAllIssues",
                "createNewIssue",
                "deleteCurrentIssue",
                "selectIssue",
                "updateIssue"
            ]
        );
        assert!(tools.iter().all(|t| t["type"] == "function"));
    }

    #[test]
    fn test_parameter_constraints() {
        let filter = VoiceTool::FilterByAssignee.parameters().unwrap();
        assert_eq!(filter["required"], json!(["assignee"]));

        let select = VoiceTool::SelectIssue.parameters().unwrap();
        assert_eq!(select["properties"]["id"]["type"], "number");
        assert_eq!(select["required"], json!(["id"]));

        let update = VoiceTool::UpdateIssue.parameters().unwrap();
        assert_eq!(update["minProperties"], 1);
        assert!(update.get("required").is_none());
        assert_eq!(
            update["properties"]["status"]["enum"],
            json!(["OPEN", "IN_PROGRESS", "RESOLVED", "CLOSED"])
        );

        assert!(VoiceTool::ShowAllIssues.parameters().is_none());
        assert!(VoiceTool::CreateNewIssue.parameters().is_none());
        assert!(VoiceTool::DeleteCurrentIssue.parameters().is_none());
    }

    #[test]
    fn test_parameterless_tool_omits_parameters_key() {
        let value = serde_json::to_value(VoiceTool::ShowAllIssues.definition()).unwrap();
        assert!(value.get("parameters").is_none());
    }

    #[tokio::test]
    async fn test_publish_once() {
        let publisher = ToolSchemaPublisher::new(&SessionOptions::default()).unwrap();
        let channel = RecordingChannel::default();

        assert!(publisher.publish(&channel).await.unwrap());
        assert!(!publisher.publish(&channel).await.unwrap());

        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], publisher.payload());
        assert!(publisher.is_published());
    }

    #[tokio::test]
    async fn test_failed_publish_can_retry() {
        let publisher = ToolSchemaPublisher::new(&SessionOptions::default()).unwrap();
        let broken = RecordingChannel {
            fail: true,
            ..Default::default()
        };

        assert!(publisher.publish(&broken).await.is_err());
        assert!(!publisher.is_published());

        let channel = RecordingChannel::default();
        assert!(publisher.publish(&channel).await.unwrap());
    }

    #[test]
    fn test_options_are_forwarded() {
        let options = SessionOptions {
            instructions: Some("Be brief".to_string()),
            voice: Some("verse".to_string()),
        };
        let value = serde_json::to_value(session_update_event(&options)).unwrap();
        assert_eq!(value["session"]["instructions"], "Be brief");
        assert_eq!(value["session"]["voice"], "verse");
    }
}
