use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override the environment.
///
/// # Example YAML structure
/// ```yaml
/// realtime:
///   base_url: "https://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   voice: "verse"
///   instructions: "You manage an issue tracker."
///   token_url: "http://localhost:8080/api/realtime/session"
///   api_key: "sk-..."
///
/// issues:
///   service_url: "http://localhost:8080/connect"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub realtime: Option<RealtimeYaml>,
    pub issues: Option<IssuesYaml>,
}

/// Realtime session configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    /// Ephemeral credential endpoint
    pub token_url: Option<String>,
    /// OpenAI API key used to request ephemeral credentials directly
    pub api_key: Option<String>,
}

/// Issue service configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IssuesYaml {
    pub service_url: Option<String>,
}

impl YamlConfig {
    /// Load and parse a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_str(&contents)
    }

    /// Parse YAML text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}
