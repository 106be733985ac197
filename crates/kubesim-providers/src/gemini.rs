//! Gemini generator.
//!
//! Calls the Google AI Studio API:
//! `https://generativelanguage.googleapis.com/v1beta/models/{MODEL}:generateContent?key={KEY}`

use crate::cleanup::extract_json;
use crate::generator::{GenerationRequest, ResponseGenerator};
use crate::prompt::{build_task, SYSTEM_INSTRUCTION};
use async_trait::async_trait;
use kubesim_core::{SimError, SimResult};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Default Google AI Studio base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: SecretString,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// API base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create a configuration with the default model and endpoint
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.5,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Generator backed by Gemini
#[derive(Debug)]
pub struct GeminiGenerator {
    config: GeminiConfig,
    client: Client,
}

impl GeminiGenerator {
    /// Create a new generator
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built
    pub fn new(config: GeminiConfig) -> SimResult<Self> {
        url::Url::parse(&config.base_url).map_err(|e| {
            SimError::configuration(format!("Invalid generator base URL '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SimError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Model in use
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key.expose_secret()
        )
    }

    fn build_request(&self, request: &GenerationRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: build_task(&request.method, &request.path),
                }],
            }],
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(self.config.temperature),
                response_mime_type: None,
            }),
        }
    }

    fn response_text(response: GeminiResponse) -> SimResult<String> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| SimError::generation("No candidates in Gemini response"))?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(SimError::generation(format!(
                "Empty Gemini response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }

    fn parse_error(status: u16, body: &str) -> SimError {
        #[derive(Deserialize)]
        struct GeminiErrorResponse {
            error: GeminiErrorDetail,
        }

        #[derive(Deserialize)]
        struct GeminiErrorDetail {
            message: String,
            #[serde(default)]
            status: Option<String>,
        }

        match serde_json::from_str::<GeminiErrorResponse>(body) {
            Ok(parsed) => SimError::generation(format!(
                "Gemini returned {status} ({}): {}",
                parsed.error.status.as_deref().unwrap_or("UNKNOWN"),
                parsed.error.message
            )),
            Err(_) => SimError::generation(format!("Gemini returned HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> SimResult<Value> {
        let body = self.build_request(request);

        debug!(
            generator = "gemini",
            model = %self.config.model,
            method = %request.method,
            path = %request.path,
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                // reqwest errors embed the URL, which carries the key
                let e = e.without_url();
                error!(error = %e, "Gemini request failed");
                SimError::generation(format!("Gemini request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "Gemini API error");
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| {
            SimError::generation(format!("Failed to parse Gemini response: {}", e.without_url()))
        })?;

        let text = Self::response_text(parsed)?;
        trace!(raw = %text, "Gemini output");
        extract_json(&text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}
