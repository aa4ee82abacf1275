//! JSON events of the realtime control channel.
//!
//! The WebRTC transport carries the same events as the WebSocket API, as
//! text messages on the `oai-events` data channel.
//!
//! Sent by the session:
//! - `session.update` declares the callable tools
//! - `conversation.item.create` answers a function call
//!
//! Received and acted on:
//! - `response.function_call_arguments.done` carries a finished tool call
//! - `session.created`, `session.updated`, `response.done` and `error` are logged
//!
//! Anything else deserializes to [`ServerEvent::Other`].

use serde::{Deserialize, Serialize};

/// Output reported for every acknowledged function call.
pub const FUNCTION_CALL_SUCCESS_OUTPUT: &str = r#"{"success":true}"#;

// =============================================================================
// Outbound
// =============================================================================

/// Body of a `session.update` event. Unset fields keep the server's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Always `"function"`
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// A `function_call_output` conversation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub call_id: String,
    pub output: String,
}

impl ConversationItem {
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// Events the session sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
}

impl ClientEvent {
    /// Acknowledge a completed function call with the fixed success payload.
    pub fn function_call_ack(call_id: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, FUNCTION_CALL_SUCCESS_OUTPUT),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Events the session reacts to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionInfo },

    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseInfo },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone(FunctionCallArgumentsDone),

    #[serde(other)]
    Other,
}

/// A tool call whose arguments have finished streaming.
///
/// Missing fields default to empty so a sparse event still gets answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FunctionCallArgumentsDone {
    /// Echoed back in the acknowledgement
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub name: String,
    /// JSON text of the arguments object
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    /// Client event that caused the error
    #[serde(default)]
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Tools the server accepted
    #[serde(default)]
    pub tools: Vec<ToolDef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseInfo {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_call_ack_wire_format() {
        let json = ClientEvent::function_call_ack("call_123").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "function_call_output",
                    "call_id": "call_123",
                    "output": "{\"success\":true}"
                }
            })
        );
    }

    #[test]
    fn test_function_call_done_deserialization() {
        let json = r#"{
            "type": "response.function_call_arguments.done",
            "event_id": "event_1",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "call_id": "call_abc",
            "name": "selectIssue",
            "arguments": "{\"id\": 3}"
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::FunctionCallArgumentsDone(done) => {
                assert_eq!(done.call_id, "call_abc");
                assert_eq!(done.name, "selectIssue");
                assert_eq!(done.arguments, "{\"id\": 3}");
                assert_eq!(done.item_id.as_deref(), Some("item_1"));
            }
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[test]
    fn test_missing_arguments_default_to_empty() {
        let json = r#"{"type": "response.function_call_arguments.done", "call_id": "c", "name": "showAllIssues"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::FunctionCallArgumentsDone(done) => assert!(done.arguments.is_empty()),
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let json = r#"{"type": "response.audio_transcript.delta", "delta": "hi"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ServerEvent::Other);
    }

    #[test]
    fn test_error_event() {
        let json = r#"{"type": "error", "error": {"type": "invalid_request_error", "code": "unknown_parameter", "message": "Unknown parameter: 'session.foo'"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.code.as_deref(), Some("unknown_parameter"));
                assert!(error.message.starts_with("Unknown parameter"));
            }
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[test]
    fn test_session_updated_lists_tools() {
        let json = r#"{"type": "session.updated", "session": {"id": "sess_1", "tools": [{"type": "function", "name": "showAllIssues"}]}}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::SessionUpdated { session } => {
                assert_eq!(session.tools.len(), 1);
                assert_eq!(session.tools[0].name, "showAllIssues");
            }
            other => panic!("Wrong event type: {:?}", other),
        }
    }
}
