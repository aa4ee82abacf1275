//! Base traits and types for the realtime voice session.
//!
//! This module defines the seams between the session orchestration and the
//! pieces it drives but does not implement: the ephemeral credential
//! endpoint, the HTTP signaling exchange, the peer connection with its
//! control data channel, and the audio capture/playback primitives.
//!
//! # Transport Events
//!
//! A peer connection reports everything that happens on it (control channel
//! open/message/close, connection state changes) through one ordered
//! [`TransportEventSender`]. The session consumes that channel from a single
//! task, which is what gives inbound messages their one-at-a-time ordering.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use zeroize::{Zeroize, ZeroizeOnDrop};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while running a voice session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// A session is already connecting or listening
    #[error("Session already active; stop it before starting a new one")]
    AlreadyActive,

    /// The session was stopped while it was still connecting
    #[error("Session start cancelled")]
    Cancelled,

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Fetching the ephemeral credential failed
    #[error("Credential request failed: {0}")]
    CredentialFailed(String),

    /// Local audio capture could not be acquired
    #[error("Media acquisition failed: {0}")]
    MediaAcquisitionFailed(String),

    /// The HTTP offer/answer exchange failed
    #[error("Signaling failed: {0}")]
    SignalingFailed(String),

    /// Session description negotiation on the peer connection failed
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Control data channel error
    #[error("Data channel error: {0}")]
    DataChannelError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::SerializationError(e.to_string())
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection
    #[default]
    Idle,
    /// `start` is in flight
    Connecting,
    /// Connection established; function calls are being dispatched
    Listening,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Listening => write!(f, "Listening"),
        }
    }
}

/// Peer connection state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    /// Whether the connection can no longer carry traffic.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }
}

/// Everything a peer connection reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The control data channel transitioned to open
    ChannelOpen,
    /// A text message arrived on the control data channel
    ChannelMessage(String),
    /// The control data channel closed
    ChannelClosed,
    /// The peer connection changed state
    PeerStateChanged(PeerState),
}

/// Ordered sink for transport events.
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving end of [`TransportEventSender`].
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

// =============================================================================
// Credentials
// =============================================================================

/// Short-lived bearer secret authorizing one signaling exchange.
///
/// The secret is wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EphemeralKey(String);

impl EphemeralKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EphemeralKey(<redacted>)")
    }
}

// =============================================================================
// Audio Types
// =============================================================================

/// One encoded audio frame (Opus) flowing into or out of the peer connection.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Encoded payload
    pub data: Bytes,
    /// Playback duration of the frame
    pub duration: Duration,
    /// RTP timestamp (48kHz clock), 0 when unknown
    pub timestamp: u32,
}

/// A local audio track to be sent to the remote peer.
#[derive(Debug)]
pub struct LocalAudioTrack {
    /// Track identifier
    pub id: String,
    /// Encoded frames; the track ends when the sender is dropped
    pub frames: mpsc::Receiver<AudioFrame>,
}

/// A captured local stream, usually a single microphone track.
#[derive(Debug)]
pub struct LocalAudioStream {
    /// Stream identifier
    pub id: String,
    pub tracks: Vec<LocalAudioTrack>,
}

/// The first media stream of an inbound track event.
#[derive(Debug)]
pub struct RemoteAudioStream {
    /// Stream identifier
    pub id: String,
    pub frames: mpsc::Receiver<AudioFrame>,
}

/// Callback type for session state transitions.
pub type SessionStateCallback =
    Arc<dyn Fn(SessionState) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Issues the ephemeral credential for a session.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch_ephemeral_key(&self) -> RealtimeResult<EphemeralKey>;
}

/// Performs the one-shot offer/answer exchange with the realtime endpoint.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    /// Send the offer SDP and return the answer SDP.
    async fn exchange(&self, offer_sdp: &str, key: &EphemeralKey) -> RealtimeResult<String>;
}

/// Acquires the local capture stream.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn capture(&self) -> RealtimeResult<LocalAudioStream>;
}

/// Plays (or otherwise consumes) the remote audio stream.
pub trait AudioSink: Send + Sync {
    fn attach(&self, stream: RemoteAudioStream);
}

/// Builds peer connections.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a new peer connection that reports to `events`.
    async fn connect(&self, events: TransportEventSender) -> RealtimeResult<Arc<dyn PeerConnection>>;
}

/// A peer connection carrying audio and one control data channel.
///
/// Closing the connection closes its data channel and media tracks.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Register the inbound media handler.
    fn on_remote_audio(&self, sink: Arc<dyn AudioSink>);

    /// Attach a local track to the connection.
    async fn add_local_track(&self, track: LocalAudioTrack) -> RealtimeResult<()>;

    /// Create the labeled control data channel. Its open, message and close
    /// notifications are delivered on the connection's event sender.
    async fn create_data_channel(&self, label: &str) -> RealtimeResult<Arc<dyn DataChannel>>;

    /// Create an offer, set it as the local description and return its SDP.
    async fn create_offer(&self) -> RealtimeResult<String>;

    /// Set the remote answer description.
    async fn set_remote_answer(&self, sdp: &str) -> RealtimeResult<()>;

    /// Close the connection and release all of its resources.
    async fn close(&self) -> RealtimeResult<()>;
}

/// The control data channel.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    /// Send one text message.
    async fn send_text(&self, text: &str) -> RealtimeResult<()>;
}
