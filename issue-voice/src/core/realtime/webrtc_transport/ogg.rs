//! File-backed audio endpoints using Ogg/Opus containers.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use webrtc::media::io::Writer;
use webrtc::media::io::ogg_reader::OggReader;
use webrtc::media::io::ogg_writer::OggWriter;
use webrtc::rtp;

use crate::core::realtime::base::{
    AudioFrame, AudioSink, AudioSource, LocalAudioStream, LocalAudioTrack, RealtimeError,
    RealtimeResult, RemoteAudioStream,
};
use crate::core::realtime::media::{FRAME_BUFFER, OPUS_CLOCK_RATE};

/// Plays an `.ogg` Opus file into the session in real time.
#[derive(Debug, Clone)]
pub struct OggOpusSource {
    path: PathBuf,
}

impl OggOpusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AudioSource for OggOpusSource {
    async fn capture(&self) -> RealtimeResult<LocalAudioStream> {
        let file = File::open(&self.path).map_err(|e| {
            RealtimeError::MediaAcquisitionFailed(format!("{}: {}", self.path.display(), e))
        })?;
        let (mut reader, header) = OggReader::new(BufReader::new(file), true)
            .map_err(|e| RealtimeError::MediaAcquisitionFailed(e.to_string()))?;

        tracing::info!(
            "Streaming {} ({} channel(s), {} Hz)",
            self.path.display(),
            header.channels,
            header.sample_rate
        );

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        tokio::spawn(async move {
            let mut last_granule: u64 = 0;
            while let Ok((page, page_header)) = reader.parse_next_page() {
                let samples = page_header.granule_position.saturating_sub(last_granule);
                last_granule = page_header.granule_position;
                let duration =
                    Duration::from_micros(samples * 1_000_000 / OPUS_CLOCK_RATE as u64);

                let frame = AudioFrame {
                    data: page.freeze(),
                    duration,
                    timestamp: last_granule as u32,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                tokio::time::sleep(duration).await;
            }
            tracing::debug!("Ogg source reached end of stream");
        });

        Ok(LocalAudioStream {
            id: "ogg-file".to_string(),
            tracks: vec![LocalAudioTrack {
                id: "ogg-audio".to_string(),
                frames: rx,
            }],
        })
    }
}

/// Records the first remote stream to an `.ogg` Opus file.
///
/// Later streams are drained and dropped.
#[derive(Debug)]
pub struct OggOpusSink {
    path: PathBuf,
    attached: AtomicBool,
}

impl OggOpusSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attached: AtomicBool::new(false),
        }
    }
}

impl AudioSink for OggOpusSink {
    fn attach(&self, stream: RemoteAudioStream) {
        let mut frames = stream.frames;

        if self.attached.swap(true, Ordering::SeqCst) {
            tracing::debug!("Ignoring additional remote stream '{}'", stream.id);
            tokio::spawn(async move { while frames.recv().await.is_some() {} });
            return;
        }

        let writer = File::create(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|file| OggWriter::new(file, OPUS_CLOCK_RATE, 2).map_err(|e| e.to_string()));
        let mut writer = match writer {
            Ok(writer) => writer,
            Err(e) => {
                tracing::error!("Cannot record to {}: {}", self.path.display(), e);
                tokio::spawn(async move { while frames.recv().await.is_some() {} });
                return;
            }
        };

        let path = self.path.clone();
        tracing::info!("Recording remote audio to {}", path.display());
        tokio::spawn(async move {
            let mut sequence: u16 = 0;
            while let Some(frame) = frames.recv().await {
                let packet = rtp::packet::Packet {
                    header: rtp::header::Header {
                        sequence_number: sequence,
                        timestamp: frame.timestamp,
                        ..Default::default()
                    },
                    payload: frame.data,
                };
                sequence = sequence.wrapping_add(1);
                if let Err(e) = writer.write_rtp(&packet) {
                    tracing::warn!("Failed to write audio to {}: {}", path.display(), e);
                    break;
                }
            }
            if let Err(e) = writer.close() {
                tracing::warn!("Failed to finalize {}: {}", path.display(), e);
            }
        });
    }
}
