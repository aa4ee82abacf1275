//! Scripted collaborators for voice session tests
//!
//! - A peer connector whose connections record every call and let the test
//!   inject transport events
//! - Credential and signaling clients with failure injection and an
//!   optional gate for holding `start` mid-flight
//! - An action set recording every callback it receives

// Allow dead code in test infrastructure - not every test uses every helper
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use issue_voice::core::IssueUpdate;
use issue_voice::core::realtime::{
    AudioSink, AudioSource, CredentialProvider, DataChannel, DiscardSink, EphemeralKey, IssueActions,
    LocalAudioStream, LocalAudioTrack, PeerConnection, PeerConnector, RealtimeError,
    RealtimeResult, SessionComponents, SignalingClient, TransportEvent, TransportEventSender,
};

pub const MOCK_ANSWER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=answer\r\n";
pub const MOCK_OFFER_SDP: &str = "v=0\r\no=- 2 2 IN IP4 127.0.0.1\r\ns=offer\r\n";

/// Ordered log shared by channels and actions, e.g. `ack:c1`, `action:ShowAll`.
pub type Timeline = Arc<Mutex<Vec<String>>>;

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Let spawned tasks run for a moment.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Data Channel
// =============================================================================

/// Control channel recording everything sent on it.
pub struct MockDataChannel {
    label: String,
    sent: Mutex<Vec<String>>,
    fail_sends: Mutex<bool>,
    timeline: Timeline,
}

impl MockDataChannel {
    pub fn new(label: &str) -> Self {
        Self::with_timeline(label, Timeline::default())
    }

    /// A channel that also logs each acknowledgement to `timeline`.
    pub fn with_timeline(label: &str, timeline: Timeline) -> Self {
        Self {
            label: label.to_string(),
            sent: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
            timeline,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent messages parsed as JSON.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// `call_id`s of the acknowledgements sent so far, in order.
    pub fn acked_call_ids(&self) -> Vec<String> {
        self.sent_json()
            .into_iter()
            .filter(|event| event["type"] == "conversation.item.create")
            .map(|event| event["item"]["call_id"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }
}

#[async_trait]
impl DataChannel for MockDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        if *self.fail_sends.lock() {
            return Err(RealtimeError::DataChannelError("channel closed".to_string()));
        }
        if let Ok(event) = serde_json::from_str::<serde_json::Value>(text)
            && event["type"] == "conversation.item.create"
        {
            let call_id = event["item"]["call_id"].as_str().unwrap_or_default();
            self.timeline.lock().push(format!("ack:{call_id}"));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}

// =============================================================================
// Peer Connection
// =============================================================================

/// Step at which a mock peer connection fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerFailure {
    Connect,
    AddTrack,
    CreateDataChannel,
    CreateOffer,
    SetRemoteAnswer,
}

pub struct MockPeer {
    events: TransportEventSender,
    calls: Arc<Mutex<Vec<String>>>,
    channel: Mutex<Option<Arc<MockDataChannel>>>,
    failure: Option<PeerFailure>,
    closed: AtomicUsize,
    timeline: Timeline,
}

impl MockPeer {
    fn fail_if(&self, step: PeerFailure) -> RealtimeResult<()> {
        if self.failure == Some(step) {
            return Err(RealtimeError::NegotiationFailed(format!("{step:?} failed")));
        }
        Ok(())
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> Option<Arc<MockDataChannel>> {
        self.channel.lock().clone()
    }

    /// Deliver a transport event as the real connection would.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    fn on_remote_audio(&self, _sink: Arc<dyn AudioSink>) {
        self.calls.lock().push("on_remote_audio".to_string());
    }

    async fn add_local_track(&self, track: LocalAudioTrack) -> RealtimeResult<()> {
        self.calls.lock().push(format!("add_local_track:{}", track.id));
        self.fail_if(PeerFailure::AddTrack)
    }

    async fn create_data_channel(&self, label: &str) -> RealtimeResult<Arc<dyn DataChannel>> {
        self.calls.lock().push(format!("create_data_channel:{label}"));
        self.fail_if(PeerFailure::CreateDataChannel)?;
        let channel = Arc::new(MockDataChannel::with_timeline(label, self.timeline.clone()));
        *self.channel.lock() = Some(channel.clone());
        Ok(channel)
    }

    async fn create_offer(&self) -> RealtimeResult<String> {
        self.calls.lock().push("create_offer".to_string());
        self.fail_if(PeerFailure::CreateOffer)?;
        Ok(MOCK_OFFER_SDP.to_string())
    }

    async fn set_remote_answer(&self, sdp: &str) -> RealtimeResult<()> {
        self.calls.lock().push(format!("set_remote_answer:{}", sdp.len()));
        self.fail_if(PeerFailure::SetRemoteAnswer)
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.calls.lock().push("close".to_string());
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out [`MockPeer`]s and remembering them.
#[derive(Default)]
pub struct MockPeerConnector {
    peers: Mutex<Vec<Arc<MockPeer>>>,
    calls: Arc<Mutex<Vec<String>>>,
    failure: Mutex<Option<PeerFailure>>,
    /// Shared with every data channel this connector creates
    pub timeline: Timeline,
}

impl MockPeerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(step: PeerFailure) -> Self {
        let connector = Self::default();
        *connector.failure.lock() = Some(step);
        connector
    }

    pub fn set_failure(&self, failure: Option<PeerFailure>) {
        *self.failure.lock() = failure;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// The most recently created connection.
    pub fn last_peer(&self) -> Arc<MockPeer> {
        self.peers.lock().last().cloned().expect("no peer connection created")
    }

    /// The control channel of the most recent connection.
    pub fn last_channel(&self) -> Arc<MockDataChannel> {
        self.last_peer().channel().expect("no data channel created")
    }
}

#[async_trait]
impl PeerConnector for MockPeerConnector {
    async fn connect(&self, events: TransportEventSender) -> RealtimeResult<Arc<dyn PeerConnection>> {
        self.calls.lock().push("connect".to_string());
        let failure = *self.failure.lock();
        if failure == Some(PeerFailure::Connect) {
            return Err(RealtimeError::NegotiationFailed("connect failed".to_string()));
        }

        let peer = Arc::new(MockPeer {
            events,
            calls: self.calls.clone(),
            channel: Mutex::new(None),
            failure,
            closed: AtomicUsize::new(0),
            timeline: self.timeline.clone(),
        });
        self.peers.lock().push(peer.clone());
        Ok(peer)
    }
}

// =============================================================================
// Credentials, Signaling, Audio
// =============================================================================

#[derive(Default)]
pub struct MockCredentials {
    pub requests: AtomicUsize,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    async fn fetch_ephemeral_key(&self) -> RealtimeResult<EphemeralKey> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(RealtimeError::CredentialFailed("HTTP 500".to_string()));
        }
        Ok(EphemeralKey::new("ek_test"))
    }
}

#[derive(Default)]
pub struct MockSignaling {
    pub offers: Mutex<Vec<String>>,
    pub keys: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
    /// When set, `exchange` waits for a notification before answering
    pub gate: Mutex<Option<Arc<Notify>>>,
    /// Notified when `exchange` has been entered
    pub entered: Arc<Notify>,
}

impl MockSignaling {
    /// Hold every exchange until the returned notifier fires.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl SignalingClient for MockSignaling {
    async fn exchange(&self, offer_sdp: &str, key: &EphemeralKey) -> RealtimeResult<String> {
        self.offers.lock().push(offer_sdp.to_string());
        self.keys.lock().push(key.expose().to_string());
        self.entered.notify_one();

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if *self.fail.lock() {
            return Err(RealtimeError::SignalingFailed("HTTP 401".to_string()));
        }
        Ok(MOCK_ANSWER_SDP.to_string())
    }
}

/// Single-track source; optionally fails like a denied microphone.
#[derive(Default)]
pub struct MockAudioSource {
    pub fail: Mutex<bool>,
}

#[async_trait]
impl AudioSource for MockAudioSource {
    async fn capture(&self) -> RealtimeResult<LocalAudioStream> {
        if *self.fail.lock() {
            return Err(RealtimeError::MediaAcquisitionFailed("permission denied".to_string()));
        }
        let (_tx, rx) = mpsc::channel(1);
        Ok(LocalAudioStream {
            id: "mock-mic".to_string(),
            tracks: vec![LocalAudioTrack {
                id: "mic".to_string(),
                frames: rx,
            }],
        })
    }
}

/// All scripted collaborators of one session.
pub struct MockStack {
    pub credentials: Arc<MockCredentials>,
    pub signaling: Arc<MockSignaling>,
    pub connector: Arc<MockPeerConnector>,
    pub audio: Arc<MockAudioSource>,
}

impl MockStack {
    pub fn new() -> Self {
        Self::with_connector(MockPeerConnector::new())
    }

    pub fn with_connector(connector: MockPeerConnector) -> Self {
        Self {
            credentials: Arc::new(MockCredentials::default()),
            signaling: Arc::new(MockSignaling::default()),
            connector: Arc::new(connector),
            audio: Arc::new(MockAudioSource::default()),
        }
    }

    pub fn components(&self) -> SessionComponents {
        SessionComponents {
            credentials: self.credentials.clone(),
            signaling: self.signaling.clone(),
            connector: self.connector.clone(),
            audio_source: self.audio.clone(),
            audio_sink: Arc::new(DiscardSink::new()),
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCall {
    Filter(String),
    ShowAll,
    Create,
    Delete,
    Select(i64),
    Update(i64, IssueUpdate),
}

/// Action set that records calls, tagged with the set's name.
pub struct RecordingActions {
    pub name: &'static str,
    pub calls: Arc<Mutex<Vec<(&'static str, ActionCall)>>>,
    /// Delay applied inside `show_all`
    pub show_all_delay: Duration,
    /// Receives `action:<call>` when an action completes
    pub timeline: Option<Timeline>,
}

impl RecordingActions {
    pub fn new(name: &'static str, calls: Arc<Mutex<Vec<(&'static str, ActionCall)>>>) -> Self {
        Self {
            name,
            calls,
            show_all_delay: Duration::ZERO,
            timeline: None,
        }
    }

    fn record(&self, call: ActionCall) {
        if let Some(ref timeline) = self.timeline {
            timeline.lock().push(format!("action:{call:?}"));
        }
        self.calls.lock().push((self.name, call));
    }
}

#[async_trait]
impl IssueActions for RecordingActions {
    async fn filter_by_assignee(&self, assignee: String) {
        self.record(ActionCall::Filter(assignee));
    }

    async fn show_all(&self) {
        if !self.show_all_delay.is_zero() {
            tokio::time::sleep(self.show_all_delay).await;
        }
        self.record(ActionCall::ShowAll);
    }

    async fn create_issue(&self) {
        self.record(ActionCall::Create);
    }

    async fn delete_issue(&self) {
        self.record(ActionCall::Delete);
    }

    async fn select_issue(&self, id: i64) {
        self.record(ActionCall::Select(id));
    }

    async fn update_issue(&self, id: i64, updates: IssueUpdate) {
        self.record(ActionCall::Update(id, updates));
    }
}

/// A `response.function_call_arguments.done` event as the server sends it.
pub fn function_call_event(call_id: &str, name: &str, arguments: &str) -> TransportEvent {
    TransportEvent::ChannelMessage(
        serde_json::json!({
            "type": "response.function_call_arguments.done",
            "event_id": format!("event_{call_id}"),
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "call_id": call_id,
            "name": name,
            "arguments": arguments,
        })
        .to_string(),
    )
}

/// Run `fut` with a timeout so a hung session fails the test.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}
