//! The `issue-voice listen` command.
//!
//! Connects a [`VoiceSession`] to the realtime API, lets the model drive the
//! issue board until Ctrl-C, then stops the session. Outbound audio comes
//! from an Ogg/Opus file or silence; the model's voice can be recorded to a
//! file.
//!
//! ```text
//! $ OPENAI_API_KEY=sk-... issue-voice listen --input request.ogg --record reply.ogg
//! ```
//!
//! [`VoiceSession`]: crate::core::realtime::VoiceSession

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
#[cfg(not(feature = "webrtc-transport"))]
use anyhow::anyhow;

use crate::board::IssueBoard;
use crate::config::VoiceConfig;

/// Audio endpoints for the session.
#[derive(Debug, Clone, Default)]
pub struct ListenOptions {
    /// Ogg/Opus file streamed as the microphone; silence when unset
    pub input: Option<PathBuf>,
    /// Ogg/Opus file receiving the model's audio
    pub record: Option<PathBuf>,
}

/// Run a voice session against `board` until Ctrl-C.
#[cfg(feature = "webrtc-transport")]
pub async fn run(config: &VoiceConfig, board: Arc<IssueBoard>, options: ListenOptions) -> Result<()> {
    use anyhow::Context;

    use crate::core::realtime::{
        AudioSink, AudioSource, DiscardSink, OggOpusSink, OggOpusSource, SessionComponents,
        SessionState, SessionStateCallback, SilenceSource, VoiceSession, VoiceSessionConfig,
        WebRtcConnector,
    };

    let audio_source: Arc<dyn AudioSource> = match options.input {
        Some(path) => Arc::new(OggOpusSource::new(path)),
        None => Arc::new(SilenceSource::new()),
    };
    let audio_sink: Arc<dyn AudioSink> = match options.record {
        Some(path) => Arc::new(OggOpusSink::new(path)),
        None => Arc::new(DiscardSink::new()),
    };

    let components = SessionComponents {
        credentials: Arc::new(config.credential_provider()?),
        signaling: Arc::new(config.signaling_client()),
        connector: Arc::new(WebRtcConnector::new()),
        audio_source,
        audio_sink,
    };

    let session = VoiceSession::new(
        components,
        board.dispatch_handle(),
        VoiceSessionConfig {
            options: config.session_options(),
            ..Default::default()
        },
    );
    let state_callback: SessionStateCallback = Arc::new(|state: SessionState| {
        Box::pin(async move {
            tracing::info!("Voice session state: {}", state);
        })
    });
    session.on_state_change(state_callback);

    session
        .start()
        .await
        .context("Failed to start voice session")?;
    println!("Listening. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;

    session.stop().await;

    let snapshot = board.snapshot();
    println!("{} issue(s) on the board", snapshot.issues.len());
    if let Some(selected) = snapshot.selected {
        println!("Selected: #{} {}", selected.id, selected.title);
    }
    Ok(())
}

#[cfg(not(feature = "webrtc-transport"))]
pub async fn run(_config: &VoiceConfig, _board: Arc<IssueBoard>, _options: ListenOptions) -> Result<()> {
    Err(anyhow!(
        "`issue-voice listen` requires the `webrtc-transport` feature. \
         Rebuild with `--features webrtc-transport` to open voice sessions."
    ))
}

#[cfg(all(test, not(feature = "webrtc-transport")))]
mod tests {
    use super::*;
    use crate::services::InMemoryIssueService;

    #[tokio::test]
    async fn test_listen_requires_feature() {
        let board = IssueBoard::new(Arc::new(InMemoryIssueService::new()));
        let err = run(&VoiceConfig::default(), board, ListenOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("webrtc-transport"));
    }
}
