//! Voice-control session over a realtime peer connection.
//!
//! A [`VoiceSession`] owns at most one peer connection and its control data
//! channel. `start` performs the full setup sequence:
//!
//! 1. fetch an ephemeral credential
//! 2. build the peer connection
//! 3. register the inbound audio handler
//! 4. capture local audio and attach its tracks
//! 5. create the control data channel
//! 6. create and set the local offer
//! 7. exchange the offer for an answer over HTTP
//! 8. set the remote answer
//!
//! Afterwards a single task consumes the connection's transport events in
//! order: the first channel-open publishes the tool schema, and every
//! control message is parsed and handed to the [`FunctionCallDispatcher`],
//! one at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = DispatchHandle::new(board.clone(), board.snapshot());
//! let session = VoiceSession::new(components, handle, VoiceSessionConfig::default());
//!
//! session.start().await?;
//! // ... speak ...
//! session.stop().await;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::base::{
    AudioSink, AudioSource, CredentialProvider, DataChannel, EphemeralKey, PeerConnection,
    PeerConnector, RealtimeError, RealtimeResult, SessionState, SessionStateCallback,
    SignalingClient, TransportEvent, TransportEventReceiver,
};
use super::openai::config::CONTROL_CHANNEL_LABEL;
use super::openai::dispatcher::{DispatchHandle, FunctionCallDispatcher};
use super::openai::messages::ServerEvent;
use super::openai::tools::{SessionOptions, ToolSchemaPublisher};

/// Session-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSessionConfig {
    /// Label of the control data channel
    pub channel_label: String,
    /// Extras for the tool declaration
    pub options: SessionOptions,
}

impl Default for VoiceSessionConfig {
    fn default() -> Self {
        Self {
            channel_label: CONTROL_CHANNEL_LABEL.to_string(),
            options: SessionOptions::default(),
        }
    }
}

/// External collaborators a session drives.
#[derive(Clone)]
pub struct SessionComponents {
    pub credentials: Arc<dyn CredentialProvider>,
    pub signaling: Arc<dyn SignalingClient>,
    pub connector: Arc<dyn PeerConnector>,
    pub audio_source: Arc<dyn AudioSource>,
    pub audio_sink: Arc<dyn AudioSink>,
}

/// The live connection created by `start` and consumed by `stop`.
struct ActiveConnection {
    peer: Arc<dyn PeerConnection>,
    shutdown: CancellationToken,
    event_task: JoinHandle<()>,
}

impl ActiveConnection {
    /// Stop the event loop and close the peer connection.
    ///
    /// The event task is not awaited: `close` may run on that task itself.
    async fn close(self) {
        self.shutdown.cancel();
        if let Err(e) = self.peer.close().await {
            tracing::warn!("Error while closing peer connection: {}", e);
        }
        drop(self.event_task);
    }
}

struct SessionInner {
    state: SessionState,
    /// Cancellation for an in-flight `start`
    pending: Option<CancellationToken>,
    active: Option<ActiveConnection>,
    /// Incremented on every `start`; stale teardown requests are ignored
    generation: u64,
}

struct SessionShared {
    inner: Mutex<SessionInner>,
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionShared {
    async fn notify(&self, state: SessionState) {
        let callback = self.state_callback.lock().clone();
        if let Some(cb) = callback {
            cb(state).await;
        }
    }

    /// Tear down the connection of `generation` after the transport died.
    ///
    /// If `start` has not installed the connection yet, the pending start is
    /// cancelled instead and settles the session itself.
    async fn teardown(&self, generation: u64) {
        let active = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            if inner.active.is_none()
                && let Some(ref token) = inner.pending
            {
                token.cancel();
                return;
            }
            inner.active.take()
        };

        if let Some(active) = active {
            active.close().await;
            self.inner.lock().state = SessionState::Idle;
            tracing::info!("Voice session ended by transport");
            self.notify(SessionState::Idle).await;
        }
    }
}

/// A voice-control session.
pub struct VoiceSession {
    config: VoiceSessionConfig,
    components: SessionComponents,
    dispatcher: FunctionCallDispatcher,
    shared: Arc<SessionShared>,
}

impl VoiceSession {
    pub fn new(
        components: SessionComponents,
        handle: DispatchHandle,
        config: VoiceSessionConfig,
    ) -> Self {
        Self {
            config,
            components,
            dispatcher: FunctionCallDispatcher::new(handle),
            shared: Arc::new(SessionShared {
                inner: Mutex::new(SessionInner {
                    state: SessionState::Idle,
                    pending: None,
                    active: None,
                    generation: 0,
                }),
                state_callback: Mutex::new(None),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// The cells the dispatcher reads callbacks and view state from.
    pub fn dispatch_handle(&self) -> &DispatchHandle {
        self.dispatcher.handle()
    }

    pub fn config(&self) -> &VoiceSessionConfig {
        &self.config
    }

    /// Register a callback for state transitions.
    pub fn on_state_change(&self, callback: SessionStateCallback) {
        *self.shared.state_callback.lock() = Some(callback);
    }

    /// Establish the connection and begin listening.
    ///
    /// Fails with [`RealtimeError::AlreadyActive`] unless the session is
    /// idle. On any failure the session returns to idle with nothing left
    /// open, and a later `start` is allowed.
    pub async fn start(&self) -> RealtimeResult<()> {
        let (token, generation) = {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Idle {
                return Err(RealtimeError::AlreadyActive);
            }
            inner.state = SessionState::Connecting;
            inner.generation += 1;
            let token = CancellationToken::new();
            inner.pending = Some(token.clone());
            (token, inner.generation)
        };

        tracing::info!("Starting voice session");
        self.shared.notify(SessionState::Connecting).await;

        match self.establish(&token, generation).await {
            Ok(active) => {
                let mut active = Some(active);
                let installed = {
                    let mut inner = self.shared.inner.lock();
                    inner.pending = None;
                    if token.is_cancelled() {
                        false
                    } else {
                        inner.active = active.take();
                        inner.state = SessionState::Listening;
                        true
                    }
                };

                if installed {
                    tracing::info!("Voice session listening");
                    self.shared.notify(SessionState::Listening).await;
                    return Ok(());
                }

                if let Some(active) = active {
                    active.close().await;
                }
                self.settle_idle().await;
                tracing::info!("Voice session start cancelled");
                Err(RealtimeError::Cancelled)
            }
            Err(e) => {
                self.shared.inner.lock().pending = None;
                self.settle_idle().await;
                tracing::error!("Failed to start voice session: {}", e);
                Err(e)
            }
        }
    }

    /// Close the connection and return to idle.
    ///
    /// Safe to call repeatedly. When a `start` is still in flight it is
    /// cancelled; that call releases its resources and settles the session
    /// in idle once its current step completes. Until then the state stays
    /// [`SessionState::Connecting`] and a new `start` fails with
    /// [`RealtimeError::AlreadyActive`].
    pub async fn stop(&self) {
        let active = {
            let mut inner = self.shared.inner.lock();
            if let Some(ref token) = inner.pending {
                tracing::info!("Stop requested while connecting");
                token.cancel();
            }
            inner.active.take()
        };

        let Some(active) = active else {
            return;
        };

        active.close().await;
        self.settle_idle().await;
        tracing::info!("Voice session stopped");
    }

    async fn settle_idle(&self) {
        self.shared.inner.lock().state = SessionState::Idle;
        self.shared.notify(SessionState::Idle).await;
    }

    async fn establish(
        &self,
        token: &CancellationToken,
        generation: u64,
    ) -> RealtimeResult<ActiveConnection> {
        let key = self.components.credentials.fetch_ephemeral_key().await?;
        ensure_live(token)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let peer = self.components.connector.connect(event_tx).await?;

        let channel = match self.negotiate(peer.as_ref(), &key, token).await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = peer.close().await {
                    tracing::warn!("Error closing peer after failed start: {}", close_err);
                }
                return Err(e);
            }
        };

        let publisher = match ToolSchemaPublisher::new(&self.config.options) {
            Ok(publisher) => publisher,
            Err(e) => {
                if let Err(close_err) = peer.close().await {
                    tracing::warn!("Error closing peer after failed start: {}", close_err);
                }
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        let event_task = tokio::spawn(run_event_loop(
            event_rx,
            channel,
            publisher,
            self.dispatcher.clone(),
            shutdown.clone(),
            self.shared.clone(),
            generation,
        ));

        Ok(ActiveConnection {
            peer,
            shutdown,
            event_task,
        })
    }

    async fn negotiate(
        &self,
        peer: &dyn PeerConnection,
        key: &EphemeralKey,
        token: &CancellationToken,
    ) -> RealtimeResult<Arc<dyn DataChannel>> {
        peer.on_remote_audio(self.components.audio_sink.clone());

        let stream = self.components.audio_source.capture().await?;
        ensure_live(token)?;
        tracing::debug!(
            "Captured local stream '{}' with {} track(s)",
            stream.id,
            stream.tracks.len()
        );
        for track in stream.tracks {
            peer.add_local_track(track).await?;
        }

        let channel = peer.create_data_channel(&self.config.channel_label).await?;

        let offer = peer.create_offer().await?;
        ensure_live(token)?;

        let answer = self.components.signaling.exchange(&offer, key).await?;
        ensure_live(token)?;

        peer.set_remote_answer(&answer).await?;
        Ok(channel)
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        let active = {
            let mut inner = self.shared.inner.lock();
            if let Some(ref token) = inner.pending {
                token.cancel();
            }
            inner.active.take()
        };
        if let Some(active) = active
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            runtime.spawn(active.close());
        }
    }
}

fn ensure_live(token: &CancellationToken) -> RealtimeResult<()> {
    if token.is_cancelled() {
        Err(RealtimeError::Cancelled)
    } else {
        Ok(())
    }
}

/// Consume transport events for one connection, strictly in order.
async fn run_event_loop(
    mut events: TransportEventReceiver,
    channel: Arc<dyn DataChannel>,
    publisher: ToolSchemaPublisher,
    dispatcher: FunctionCallDispatcher,
    shutdown: CancellationToken,
    shared: Arc<SessionShared>,
    generation: u64,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            TransportEvent::ChannelOpen => {
                tracing::info!("Control channel '{}' opened", channel.label());
                // Without the tool declaration no call can ever be dispatched
                if let Err(e) = publisher.publish(channel.as_ref()).await {
                    tracing::error!("Failed to publish tool schema: {}; ending voice session", e);
                    shared.teardown(generation).await;
                    break;
                }
            }
            TransportEvent::ChannelMessage(text) => {
                // Nothing is dispatched before the model knows the tools
                if !publisher.is_published() {
                    tracing::trace!("Dropping control message received before channel open");
                    continue;
                }
                handle_message(&text, channel.as_ref(), &dispatcher).await;
            }
            TransportEvent::ChannelClosed => {
                tracing::info!("Control channel '{}' closed", channel.label());
            }
            TransportEvent::PeerStateChanged(state) => {
                tracing::debug!("Peer connection state: {:?}", state);
                if state.is_terminal() {
                    tracing::warn!("Peer connection {:?}; ending voice session", state);
                    shared.teardown(generation).await;
                    break;
                }
            }
        }
    }

    tracing::debug!("Voice session event loop ended");
}

async fn handle_message(text: &str, channel: &dyn DataChannel, dispatcher: &FunctionCallDispatcher) {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Failed to parse control message: {} - {}", e, text);
            return;
        }
    };

    match event {
        ServerEvent::FunctionCallArgumentsDone(call) => {
            if let Err(e) = dispatcher.dispatch(&call, channel).await {
                tracing::error!("Failed to acknowledge function call {}: {}", call.call_id, e);
            }
        }
        ServerEvent::Error { error } => {
            tracing::error!("Realtime error: {} - {}", error.error_type, error.message);
        }
        ServerEvent::SessionCreated { session } => {
            tracing::info!("Realtime session created: {}", session.id);
        }
        ServerEvent::SessionUpdated { session } => {
            tracing::debug!(
                "Realtime session {} updated ({} tools)",
                session.id,
                session.tools.len()
            );
        }
        ServerEvent::ResponseDone { response } => {
            tracing::debug!("Response done: {}", response.id);
        }
        ServerEvent::Other => {
            tracing::trace!("Unhandled control event");
        }
    }
}
