//! Realtime voice-control session.
//!
//! This module connects the issue board to a speech model over a WebRTC
//! peer connection and turns the model's function calls into board actions.
//!
//! # Architecture
//!
//! - `base`: collaborator traits (credentials, signaling, peer connection,
//!   audio) and the error/state types shared by everything below
//! - `session`: [`VoiceSession`], the start/stop lifecycle and the single
//!   consumer of transport events
//! - `openai`: the realtime API protocol (tool schema, dispatch, HTTP setup)
//! - `media`: headless audio endpoints
//! - `webrtc_transport`: the `webrtc` crate backend (feature
//!   `webrtc-transport`)
//!
//! # Example
//!
//! ```rust,ignore
//! use issue_voice::core::realtime::*;
//! use std::sync::Arc;
//!
//! let components = SessionComponents {
//!     credentials: Arc::new(HttpCredentialProvider::new(token_url)),
//!     signaling: Arc::new(HttpSignalingClient::openai(OpenAIRealtimeModel::default())),
//!     connector: Arc::new(WebRtcConnector::new()),
//!     audio_source: Arc::new(SilenceSource::new()),
//!     audio_sink: Arc::new(DiscardSink::new()),
//! };
//! let session = VoiceSession::new(components, board.dispatch_handle(), Default::default());
//! session.start().await?;
//! ```

mod base;
pub mod media;
pub mod openai;
mod session;
#[cfg(feature = "webrtc-transport")]
pub mod webrtc_transport;

pub use base::{
    AudioFrame, AudioSink, AudioSource, CredentialProvider, DataChannel, EphemeralKey,
    LocalAudioStream, LocalAudioTrack, PeerConnection, PeerConnector, PeerState, RealtimeError,
    RealtimeResult, RemoteAudioStream, SessionState, SessionStateCallback, SignalingClient,
    TransportEvent, TransportEventReceiver, TransportEventSender,
};
pub use media::{DiscardSink, SilenceSource};
pub use openai::{
    DispatchHandle, DispatchOutcome, FunctionCallDispatcher, HttpCredentialProvider,
    HttpSignalingClient, IssueActions, OpenAIRealtimeModel, OpenAIRealtimeVoice, Rejection,
    SessionOptions, ToolSchemaPublisher, ViewPublisher, ViewSnapshot, VoiceTool,
};
pub use session::{SessionComponents, VoiceSession, VoiceSessionConfig};
#[cfg(feature = "webrtc-transport")]
pub use webrtc_transport::{OggOpusSink, OggOpusSource, WebRtcConnector};

/// Whether this build can open real peer connections.
pub fn webrtc_available() -> bool {
    cfg!(feature = "webrtc-transport")
}
