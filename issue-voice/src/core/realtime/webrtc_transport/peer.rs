//! Peer connection backed by the `webrtc` crate.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::core::realtime::base::{
    AudioFrame, AudioSink, DataChannel, LocalAudioTrack, PeerConnection, PeerConnector, PeerState,
    RealtimeError, RealtimeResult, RemoteAudioStream, TransportEvent, TransportEventSender,
};
use crate::core::realtime::media::{FRAME_BUFFER, OPUS_CLOCK_RATE, OPUS_FRAME_DURATION};

/// Public STUN server used when none is configured.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Stream id of outbound tracks.
const LOCAL_STREAM_ID: &str = "issue-voice";

fn negotiation_error(e: webrtc::Error) -> RealtimeError {
    RealtimeError::NegotiationFailed(e.to_string())
}

fn peer_state(state: RTCPeerConnectionState) -> Option<PeerState> {
    match state {
        RTCPeerConnectionState::New => Some(PeerState::New),
        RTCPeerConnectionState::Connecting => Some(PeerState::Connecting),
        RTCPeerConnectionState::Connected => Some(PeerState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Builds [`WebRtcPeer`]s with the default Opus media engine.
#[derive(Debug, Clone)]
pub struct WebRtcConnector {
    ice_servers: Vec<String>,
}

impl Default for WebRtcConnector {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
        }
    }
}

impl WebRtcConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ICE server URLs. An empty list disables STUN.
    pub fn with_ice_servers(mut self, urls: Vec<String>) -> Self {
        self.ice_servers = urls;
        self
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self, events: TransportEventSender) -> RealtimeResult<Arc<dyn PeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(negotiation_error)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(negotiation_error)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if self.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };

        let pc = api
            .new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await
            .map_err(negotiation_error)?;
        let pc = Arc::new(pc);

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            if let Some(state) = peer_state(state) {
                let _ = state_events.send(TransportEvent::PeerStateChanged(state));
            }
            Box::pin(async {})
        }));

        tracing::debug!("Created WebRTC peer connection");
        Ok(Arc::new(WebRtcPeer {
            pc,
            events,
            closed: CancellationToken::new(),
        }))
    }
}

// =============================================================================
// Peer Connection
// =============================================================================

/// A live `RTCPeerConnection`.
pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
    events: TransportEventSender,
    /// Stops local track pumps when the connection closes
    closed: CancellationToken,
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    fn on_remote_audio(&self, sink: Arc<dyn AudioSink>) {
        self.pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let sink = sink.clone();
            Box::pin(async move {
                let (tx, rx) = mpsc::channel(FRAME_BUFFER);
                let stream_id = track.stream_id().to_string();
                tracing::info!("Remote audio track on stream '{}'", stream_id);
                sink.attach(RemoteAudioStream {
                    id: stream_id,
                    frames: rx,
                });
                tokio::spawn(forward_remote_track(track, tx));
            })
        }));
    }

    async fn add_local_track(&self, track: LocalAudioTrack) -> RealtimeResult<()> {
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: OPUS_CLOCK_RATE,
                channels: 2,
                ..Default::default()
            },
            track.id.clone(),
            LOCAL_STREAM_ID.to_owned(),
        ));

        let sender = self
            .pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| RealtimeError::MediaAcquisitionFailed(e.to_string()))?;

        // RTCP has to be read for interceptors to run
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        tokio::spawn(pump_local_track(local, track, self.closed.clone()));
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> RealtimeResult<Arc<dyn DataChannel>> {
        let channel = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| RealtimeError::DataChannelError(e.to_string()))?;

        let open_events = self.events.clone();
        channel.on_open(Box::new(move || {
            let _ = open_events.send(TransportEvent::ChannelOpen);
            Box::pin(async {})
        }));

        let message_events = self.events.clone();
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            if msg.is_string {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => {
                        let _ = message_events.send(TransportEvent::ChannelMessage(text));
                    }
                    Err(e) => tracing::warn!("Dropping non-UTF-8 control message: {}", e),
                }
            }
            Box::pin(async {})
        }));

        let close_events = self.events.clone();
        channel.on_close(Box::new(move || {
            let _ = close_events.send(TransportEvent::ChannelClosed);
            Box::pin(async {})
        }));

        Ok(Arc::new(WebRtcDataChannel {
            label: label.to_string(),
            channel,
        }))
    }

    async fn create_offer(&self) -> RealtimeResult<String> {
        let offer = self.pc.create_offer(None).await.map_err(negotiation_error)?;

        // Non-trickle: the single HTTP exchange must carry every candidate
        let mut gathering = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(negotiation_error)?;
        let _ = gathering.recv().await;

        let local = self.pc.local_description().await.ok_or_else(|| {
            RealtimeError::NegotiationFailed("No local description after offer".to_string())
        })?;
        Ok(local.sdp)
    }

    async fn set_remote_answer(&self, sdp: &str) -> RealtimeResult<()> {
        let answer = RTCSessionDescription::answer(sdp.to_string()).map_err(negotiation_error)?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(negotiation_error)
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.closed.cancel();
        self.pc
            .close()
            .await
            .map_err(|e| RealtimeError::NegotiationFailed(format!("Close failed: {e}")))
    }
}

/// The control channel of a [`WebRtcPeer`].
pub struct WebRtcDataChannel {
    label: String,
    channel: Arc<RTCDataChannel>,
}

#[async_trait]
impl DataChannel for WebRtcDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        self.channel
            .send_text(text.to_string())
            .await
            .map(|_| ())
            .map_err(|e| RealtimeError::DataChannelError(e.to_string()))
    }
}

// =============================================================================
// Media Pumps
// =============================================================================

async fn pump_local_track(
    local: Arc<TrackLocalStaticSample>,
    mut track: LocalAudioTrack,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => break,
            frame = track.frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let sample = Sample {
            data: frame.data,
            duration: frame.duration,
            ..Default::default()
        };
        if let Err(e) = local.write_sample(&sample).await {
            tracing::debug!("Local track '{}' write failed: {}", track.id, e);
            break;
        }
    }
    tracing::debug!("Local track '{}' finished", track.id);
}

async fn forward_remote_track(track: Arc<TrackRemote>, frames: mpsc::Sender<AudioFrame>) {
    while let Ok((packet, _)) = track.read_rtp().await {
        let frame = AudioFrame {
            data: packet.payload,
            duration: OPUS_FRAME_DURATION,
            timestamp: packet.header.timestamp,
        };
        if frames.send(frame).await.is_err() {
            break;
        }
    }
    tracing::debug!("Remote track {} ended", track.id());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_state_mapping() {
        assert_eq!(peer_state(RTCPeerConnectionState::Failed), Some(PeerState::Failed));
        assert_eq!(peer_state(RTCPeerConnectionState::Closed), Some(PeerState::Closed));
        assert_eq!(peer_state(RTCPeerConnectionState::Unspecified), None);
    }

    #[tokio::test]
    async fn test_offer_contains_audio_and_data_channel() {
        let connector = WebRtcConnector::new().with_ice_servers(Vec::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = connector.connect(tx).await.unwrap();

        let (_frames_tx, frames_rx) = mpsc::channel(1);
        peer.add_local_track(LocalAudioTrack {
            id: "mic".to_string(),
            frames: frames_rx,
        })
        .await
        .unwrap();
        let channel = peer.create_data_channel("oai-events").await.unwrap();
        assert_eq!(channel.label(), "oai-events");

        let sdp = peer.create_offer().await.unwrap();
        assert!(sdp.contains("m=audio"));
        assert!(sdp.contains("m=application"));
        assert!(sdp.contains("opus"));

        peer.close().await.unwrap();
    }
}
