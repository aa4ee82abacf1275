//! Audio endpoints that need no hardware.
//!
//! [`SilenceSource`] keeps an outbound Opus track alive with comfort-noise
//! frames and [`DiscardSink`] drains inbound audio. Together they let a
//! session run headless, e.g. when the voice side is driven by a test or
//! when only the control channel matters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::base::{
    AudioFrame, AudioSink, AudioSource, LocalAudioStream, LocalAudioTrack, RealtimeResult,
    RemoteAudioStream,
};

/// Opus clock rate used by the realtime API.
pub const OPUS_CLOCK_RATE: u32 = 48_000;

/// Packetization interval of outbound audio.
pub const OPUS_FRAME_DURATION: Duration = Duration::from_millis(20);

/// A single 20ms Opus frame of silence (CELT, mono).
pub const OPUS_SILENCE_FRAME: [u8; 3] = [0xF8, 0xFF, 0xFE];

/// Frames buffered between a source task and the transport.
pub(crate) const FRAME_BUFFER: usize = 64;

/// Samples covered by one frame of `duration` at the Opus clock rate.
pub fn samples_per_frame(duration: Duration) -> u32 {
    (duration.as_micros() * OPUS_CLOCK_RATE as u128 / 1_000_000) as u32
}

/// An [`AudioSource`] producing Opus silence in real time.
#[derive(Debug, Clone)]
pub struct SilenceSource {
    frame_duration: Duration,
}

impl Default for SilenceSource {
    fn default() -> Self {
        Self {
            frame_duration: OPUS_FRAME_DURATION,
        }
    }
}

impl SilenceSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AudioSource for SilenceSource {
    async fn capture(&self) -> RealtimeResult<LocalAudioStream> {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let frame_duration = self.frame_duration;
        let step = samples_per_frame(frame_duration);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_duration);
            let mut timestamp: u32 = 0;
            loop {
                ticker.tick().await;
                let frame = AudioFrame {
                    data: Bytes::from_static(&OPUS_SILENCE_FRAME),
                    duration: frame_duration,
                    timestamp,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                timestamp = timestamp.wrapping_add(step);
            }
            tracing::debug!("Silence source finished");
        });

        Ok(LocalAudioStream {
            id: "silence".to_string(),
            tracks: vec![LocalAudioTrack {
                id: "silence-audio".to_string(),
                frames: rx,
            }],
        })
    }
}

/// An [`AudioSink`] that reads and drops every inbound frame.
#[derive(Debug, Clone, Default)]
pub struct DiscardSink {
    frames: Arc<AtomicU64>,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames drained so far across all attached streams.
    pub fn frames_received(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl AudioSink for DiscardSink {
    fn attach(&self, stream: RemoteAudioStream) {
        tracing::debug!("Discarding remote audio stream '{}'", stream.id);
        let counter = self.frames.clone();
        let mut frames = stream.frames;
        tokio::spawn(async move {
            while frames.recv().await.is_some() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
    }
}
