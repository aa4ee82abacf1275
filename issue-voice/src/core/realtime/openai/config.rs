//! Endpoints, model and voice names of the realtime voice session.

/// Signaling endpoint (SDP offer/answer exchange).
pub const OPENAI_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";

/// Endpoint issuing ephemeral session credentials.
pub const OPENAI_REALTIME_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";

/// Label of the control data channel the realtime API listens on.
pub const CONTROL_CHANNEL_LABEL: &str = "oai-events";

/// Realtime models that accept WebRTC sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAIRealtimeModel {
    Gpt4oRealtimePreview,
    #[default]
    Gpt4oRealtimePreview20241217,
    Gpt4oMiniRealtimePreview,
    Gpt4oMiniRealtimePreview20241217,
}

const MODEL_NAMES: &[(OpenAIRealtimeModel, &str)] = &[
    (OpenAIRealtimeModel::Gpt4oRealtimePreview, "gpt-4o-realtime-preview"),
    (
        OpenAIRealtimeModel::Gpt4oRealtimePreview20241217,
        "gpt-4o-realtime-preview-2024-12-17",
    ),
    (
        OpenAIRealtimeModel::Gpt4oMiniRealtimePreview,
        "gpt-4o-mini-realtime-preview",
    ),
    (
        OpenAIRealtimeModel::Gpt4oMiniRealtimePreview20241217,
        "gpt-4o-mini-realtime-preview-2024-12-17",
    ),
];

impl OpenAIRealtimeModel {
    /// Value of the `model` query parameter.
    pub fn as_str(&self) -> &'static str {
        MODEL_NAMES
            .iter()
            .find(|(model, _)| model == self)
            .map(|(_, name)| *name)
            .unwrap_or("gpt-4o-realtime-preview-2024-12-17")
    }

    /// Resolve a model name, ignoring case. Unknown names yield the default
    /// model.
    pub fn from_str_or_default(s: &str) -> Self {
        let wanted = s.trim();
        MODEL_NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(wanted))
            .map(|(model, _)| *model)
            .unwrap_or_else(|| {
                tracing::warn!("Unknown realtime model '{}', using default", wanted);
                Self::default()
            })
    }
}

impl std::fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output voices of the realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAIRealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

const VOICE_NAMES: &[(OpenAIRealtimeVoice, &str)] = &[
    (OpenAIRealtimeVoice::Alloy, "alloy"),
    (OpenAIRealtimeVoice::Ash, "ash"),
    (OpenAIRealtimeVoice::Ballad, "ballad"),
    (OpenAIRealtimeVoice::Coral, "coral"),
    (OpenAIRealtimeVoice::Echo, "echo"),
    (OpenAIRealtimeVoice::Sage, "sage"),
    (OpenAIRealtimeVoice::Shimmer, "shimmer"),
    (OpenAIRealtimeVoice::Verse, "verse"),
];

impl OpenAIRealtimeVoice {
    pub fn as_str(&self) -> &'static str {
        VOICE_NAMES
            .iter()
            .find(|(voice, _)| voice == self)
            .map(|(_, name)| *name)
            .unwrap_or("alloy")
    }

    /// Parse a voice name; `None` for unknown voices.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim();
        VOICE_NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(wanted))
            .map(|(voice, _)| *voice)
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
