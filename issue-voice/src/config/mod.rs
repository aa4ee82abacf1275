//! Configuration for the issue-voice client
//!
//! Configuration comes from .env files, environment variables and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//! The .env file is loaded in `main.rs` before anything else.
//!
//! # Environment Variables
//! - `REALTIME_BASE_URL`: signaling endpoint (default OpenAI)
//! - `REALTIME_MODEL`: realtime model name
//! - `REALTIME_VOICE`: output voice
//! - `REALTIME_INSTRUCTIONS`: system instructions for the model
//! - `REALTIME_TOKEN_URL`: ephemeral credential endpoint
//! - `OPENAI_API_KEY`: request credentials from OpenAI directly
//! - `ISSUE_SERVICE_URL`: base URL of the issue service
//!
//! # Example
//! ```rust,no_run
//! use issue_voice::config::VoiceConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VoiceConfig::from_env()?;
//! let config = VoiceConfig::from_file(Path::new("config.yaml"))?;
//! println!("Issues at {}", config.issue_service_url);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use thiserror::Error;
use url::Url;

use crate::core::realtime::openai::{
    OPENAI_REALTIME_SESSIONS_URL, OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
use crate::core::realtime::{HttpCredentialProvider, HttpSignalingClient, SessionOptions};

mod yaml;

pub use yaml::{IssuesYaml, RealtimeYaml, YamlConfig};

/// Default issue service base URL.
pub const DEFAULT_ISSUE_SERVICE_URL: &str = "http://localhost:8080/connect";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid YAML: {0}")]
    Yaml(String),

    #[error("Invalid URL for {key}: {message}")]
    InvalidUrl { key: &'static str, message: String },

    #[error("Unknown voice '{0}'")]
    UnknownVoice(String),

    #[error("No credential source: set REALTIME_TOKEN_URL or OPENAI_API_KEY")]
    MissingCredentialSource,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Signaling endpoint; the model is appended as a query parameter
    pub realtime_base_url: String,
    pub realtime_model: OpenAIRealtimeModel,
    pub realtime_voice: Option<String>,
    pub realtime_instructions: Option<String>,
    /// Ephemeral credential endpoint as configured
    pub token_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub issue_service_url: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            realtime_base_url: OPENAI_REALTIME_URL.to_string(),
            realtime_model: OpenAIRealtimeModel::default(),
            realtime_voice: None,
            realtime_instructions: None,
            token_url: None,
            openai_api_key: None,
            issue_service_url: DEFAULT_ISSUE_SERVICE_URL.to_string(),
        }
    }
}

impl Drop for VoiceConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

/// Read a variable, treating empty values as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl VoiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::merge(None);
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file on top of the environment
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path)?;
        let config = Self::merge(Some(yaml));
        config.validate()?;
        Ok(config)
    }

    /// Environment values with YAML overrides.
    pub fn merge(yaml: Option<YamlConfig>) -> Self {
        let yaml = yaml.unwrap_or_default();
        let realtime = yaml.realtime.unwrap_or_default();
        let issues = yaml.issues.unwrap_or_default();
        let defaults = Self::default();

        let model = realtime
            .model
            .or_else(|| env_var("REALTIME_MODEL"))
            .map(|m| OpenAIRealtimeModel::from_str_or_default(&m))
            .unwrap_or(defaults.realtime_model);

        Self {
            realtime_base_url: realtime
                .base_url
                .or_else(|| env_var("REALTIME_BASE_URL"))
                .unwrap_or_else(|| defaults.realtime_base_url.clone()),
            realtime_model: model,
            realtime_voice: realtime.voice.or_else(|| env_var("REALTIME_VOICE")),
            realtime_instructions: realtime
                .instructions
                .or_else(|| env_var("REALTIME_INSTRUCTIONS")),
            token_url: realtime.token_url.or_else(|| env_var("REALTIME_TOKEN_URL")),
            openai_api_key: realtime.api_key.or_else(|| env_var("OPENAI_API_KEY")),
            issue_service_url: issues
                .service_url
                .or_else(|| env_var("ISSUE_SERVICE_URL"))
                .unwrap_or_else(|| defaults.issue_service_url.clone()),
        }
    }

    /// Check URLs and the voice name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("REALTIME_BASE_URL", &self.realtime_base_url)?;
        validate_http_url("ISSUE_SERVICE_URL", &self.issue_service_url)?;
        if let Some(ref token_url) = self.token_url {
            validate_http_url("REALTIME_TOKEN_URL", token_url)?;
        }
        if let Some(ref voice) = self.realtime_voice
            && OpenAIRealtimeVoice::parse(voice).is_none()
        {
            return Err(ConfigError::UnknownVoice(voice.clone()));
        }
        Ok(())
    }

    /// The credential endpoint to use.
    ///
    /// An explicit token URL wins; with only an API key configured the
    /// OpenAI sessions endpoint is used.
    pub fn resolved_token_url(&self) -> Result<String, ConfigError> {
        match (&self.token_url, &self.openai_api_key) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(_)) => Ok(OPENAI_REALTIME_SESSIONS_URL.to_string()),
            (None, None) => Err(ConfigError::MissingCredentialSource),
        }
    }

    /// Voice normalized to its API value.
    pub fn voice(&self) -> Option<String> {
        self.realtime_voice
            .as_deref()
            .and_then(OpenAIRealtimeVoice::parse)
            .map(|voice| voice.as_str().to_string())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            instructions: self.realtime_instructions.clone(),
            voice: self.voice(),
        }
    }

    pub fn credential_provider(&self) -> Result<HttpCredentialProvider, ConfigError> {
        let mut provider = HttpCredentialProvider::new(self.resolved_token_url()?)
            .with_model(self.realtime_model)
            .with_voice(self.voice());
        if let Some(ref api_key) = self.openai_api_key {
            provider = provider.with_api_key(api_key.clone());
        }
        Ok(provider)
    }

    pub fn signaling_client(&self) -> HttpSignalingClient {
        HttpSignalingClient::new(self.realtime_base_url.clone(), self.realtime_model)
    }
}

fn validate_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        key,
        message: format!("{value}: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidUrl {
            key,
            message: format!("unsupported scheme '{scheme}'"),
        }),
    }
}
