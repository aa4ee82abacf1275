//! HTTP clients for session setup: the ephemeral credential request and the
//! WebRTC offer/answer exchange.
//!
//! # API Reference
//!
//! - Credential: `POST https://api.openai.com/v1/realtime/sessions` (or an
//!   application backend proxying it), secret at `client_secret.value`
//! - Signaling: `POST https://api.openai.com/v1/realtime?model=<model>` with
//!   `Content-Type: application/sdp`; the response body is the answer SDP
//!
//! Neither request carries a timeout; failures surface when the underlying
//! I/O fails.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use zeroize::Zeroizing;

use super::config::{OPENAI_REALTIME_URL, OpenAIRealtimeModel};
use crate::core::realtime::base::{
    CredentialProvider, EphemeralKey, RealtimeError, RealtimeResult, SignalingClient,
};

/// Content type of SDP bodies.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// OpenAI error body.
#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => format!(
            "OpenAI API error: {} ({})",
            parsed.error.message,
            parsed.error.error_type.unwrap_or_else(|| status.to_string())
        ),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

// =============================================================================
// Signaling
// =============================================================================

/// Posts the local offer to the realtime endpoint and returns the answer.
#[derive(Debug, Clone)]
pub struct HttpSignalingClient {
    http_client: Client,
    base_url: String,
    model: OpenAIRealtimeModel,
}

impl HttpSignalingClient {
    pub fn new(base_url: impl Into<String>, model: OpenAIRealtimeModel) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            model,
        }
    }

    /// Client for the public OpenAI endpoint.
    pub fn openai(model: OpenAIRealtimeModel) -> Self {
        Self::new(OPENAI_REALTIME_URL, model)
    }

    /// Reuse an existing HTTP client (connection pooling).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn model(&self) -> OpenAIRealtimeModel {
        self.model
    }

    /// Signaling URL with the model query parameter.
    pub fn endpoint_url(&self) -> String {
        format!("{}?model={}", self.base_url, self.model.as_str())
    }
}

#[async_trait]
impl SignalingClient for HttpSignalingClient {
    async fn exchange(&self, offer_sdp: &str, key: &EphemeralKey) -> RealtimeResult<String> {
        let url = self.endpoint_url();
        tracing::debug!("Posting SDP offer ({} bytes) to {}", offer_sdp.len(), url);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key.expose()))
            .header("Content-Type", SDP_CONTENT_TYPE)
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| RealtimeError::SignalingFailed(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RealtimeError::SignalingFailed(format!("Failed to read answer: {e}")))?;

        if !status.is_success() {
            return Err(RealtimeError::SignalingFailed(describe_error(status, &body)));
        }
        if body.trim().is_empty() {
            return Err(RealtimeError::SignalingFailed(
                "Empty SDP answer".to_string(),
            ));
        }

        tracing::debug!("Received SDP answer ({} bytes)", body.len());
        Ok(body)
    }
}

// =============================================================================
// Ephemeral Credentials
// =============================================================================

/// Fetches an ephemeral session secret over HTTP.
///
/// Works against the OpenAI sessions endpoint directly (with an API key) or
/// against an application backend that proxies it (without one). The
/// response may be the JSON object itself or a JSON string wrapping it.
#[derive(Clone)]
pub struct HttpCredentialProvider {
    http_client: Client,
    endpoint: String,
    api_key: Option<Zeroizing<String>>,
    model: OpenAIRealtimeModel,
    voice: Option<String>,
}

impl std::fmt::Debug for HttpCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCredentialProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}

impl HttpCredentialProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            model: OpenAIRealtimeModel::default(),
            voice: None,
        }
    }

    /// Authenticate the credential request with a standard API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(Zeroizing::new(api_key.into()));
        self
    }

    pub fn with_model(mut self, model: OpenAIRealtimeModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self) -> Value {
        let mut body = serde_json::json!({ "model": self.model.as_str() });
        if let Some(ref voice) = self.voice {
            body["voice"] = Value::String(voice.clone());
        }
        body
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch_ephemeral_key(&self) -> RealtimeResult<EphemeralKey> {
        let mut request = self.http_client.post(&self.endpoint).json(&self.request_body());
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key.as_str()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RealtimeError::CredentialFailed(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RealtimeError::CredentialFailed(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(RealtimeError::CredentialFailed(describe_error(status, &body)));
        }

        let key = parse_ephemeral_key(&body)?;
        tracing::debug!("Obtained ephemeral realtime credential");
        Ok(key)
    }
}

/// Extract `client_secret.value` from a credential response body.
///
/// Accepts either the session object or a JSON string containing it.
pub fn parse_ephemeral_key(body: &str) -> RealtimeResult<EphemeralKey> {
    let mut value: Value = serde_json::from_str(body)
        .map_err(|e| RealtimeError::CredentialFailed(format!("Invalid credential JSON: {e}")))?;

    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner).map_err(|e| {
            RealtimeError::CredentialFailed(format!("Invalid credential JSON: {e}"))
        })?;
    }

    value
        .get("client_secret")
        .and_then(|secret| secret.get("value"))
        .and_then(Value::as_str)
        .filter(|secret| !secret.is_empty())
        .map(EphemeralKey::new)
        .ok_or_else(|| {
            RealtimeError::CredentialFailed("Response has no client_secret.value".to_string())
        })
}
