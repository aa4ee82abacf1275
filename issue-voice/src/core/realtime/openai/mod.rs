//! OpenAI Realtime API pieces of the voice session.
//!
//! Over WebRTC the realtime API speaks JSON events on a data channel labeled
//! `oai-events`. This module holds everything that knows about that protocol:
//!
//! - endpoint, model and voice configuration
//! - client/server event types
//! - the tool declaration published when the channel opens
//! - the dispatcher that routes completed function calls to the board
//! - HTTP clients for the ephemeral credential and the SDP exchange
//!
//! # Supported Models
//!
//! - `gpt-4o-realtime-preview`
//! - `gpt-4o-realtime-preview-2024-12-17` (default)
//! - `gpt-4o-mini-realtime-preview`
//! - `gpt-4o-mini-realtime-preview-2024-12-17`
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse

pub mod config;
pub mod dispatcher;
pub mod messages;
pub mod signaling;
pub mod tools;

pub use config::{
    CONTROL_CHANNEL_LABEL, OPENAI_REALTIME_SESSIONS_URL, OPENAI_REALTIME_URL, OpenAIRealtimeModel,
    OpenAIRealtimeVoice,
};
pub use dispatcher::{
    DispatchHandle, DispatchOutcome, FunctionCallDispatcher, IssueActions, Rejection,
    ViewPublisher, ViewSnapshot,
};
pub use messages::{
    ClientEvent, ConversationItem, FUNCTION_CALL_SUCCESS_OUTPUT, FunctionCallArgumentsDone,
    ServerEvent, SessionConfig, ToolDef,
};
pub use signaling::{HttpCredentialProvider, HttpSignalingClient, parse_ephemeral_key};
pub use tools::{SessionOptions, ToolSchemaPublisher, VoiceTool, session_update_event, tool_definitions};
