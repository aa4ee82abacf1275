//! WebRTC transport for the voice session (feature `webrtc-transport`).
//!
//! - [`WebRtcConnector`] builds peer connections with an Opus media engine
//!   and forwards data-channel and connection-state notifications as
//!   transport events.
//! - [`OggOpusSource`] / [`OggOpusSink`] stream a file into the session and
//!   record the model's voice.

mod ogg;
mod peer;

pub use ogg::{OggOpusSink, OggOpusSource};
pub use peer::{DEFAULT_STUN_SERVER, WebRtcConnector, WebRtcDataChannel, WebRtcPeer};
