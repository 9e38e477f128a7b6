//! Text-completion backends.
//!
//! Defines the [`CompletionService`] trait and two implementations:
//! - **[`OllamaClient`]**: calls a local Ollama instance's `/api/chat` endpoint.
//! - **[`OpenAiClient`]**: calls an OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! Pipeline code never talks to a service directly; it goes through [`Llm`],
//! which maps a [`ModelProfile`] to the configured model id and applies the
//! call deadline.
//!
//! # Provider Selection
//!
//! | Config Value | Service | Default URL |
//! |-------------|---------|-------------|
//! | `"ollama"` | [`OllamaClient`] | `http://localhost:11434` |
//! | `"openai"` | [`OpenAiClient`] | `https://api.openai.com` |
//!
//! Calls are never retried. A failed call surfaces as an error, or as a
//! [`Generated::Failed`] where the caller can substitute a placeholder.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Result, ScoutError};

/// A synchronous-contract text completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete `prompt` with the model `model` and return the generated text.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Which configured model a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProfile {
    /// Natural-language generation (summaries, routing, answers).
    Chat,
    /// SQL generation.
    Sql,
}

/// Outcome of a model call that is allowed to fail without failing the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Text(String),
    Failed(String),
}

impl Generated {
    pub fn is_failed(&self) -> bool {
        matches!(self, Generated::Failed(_))
    }

    /// The generated text, or the fixed placeholder embedding the failure.
    pub fn render(self) -> String {
        match self {
            Generated::Text(text) => text,
            Generated::Failed(reason) => format!("AI generation failed: {}", reason),
        }
    }
}

/// Profile-aware, deadline-enforcing front end to a [`CompletionService`].
#[derive(Clone)]
pub struct Llm {
    service: Arc<dyn CompletionService>,
    chat_model: String,
    sql_model: String,
    timeout: Duration,
}

impl Llm {
    pub fn new(service: Arc<dyn CompletionService>, config: &LlmConfig) -> Self {
        Self {
            service,
            chat_model: config.chat_model.clone(),
            sql_model: config.sql_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn model_for(&self, profile: ModelProfile) -> &str {
        match profile {
            ModelProfile::Chat => &self.chat_model,
            ModelProfile::Sql => &self.sql_model,
        }
    }

    /// One completion. Errors and blank output become [`ScoutError::Generation`].
    pub async fn complete(&self, profile: ModelProfile, prompt: &str) -> Result<String> {
        let model = self.model_for(profile);
        tracing::debug!(model, prompt_chars = prompt.len(), "model call");

        let text = match tokio::time::timeout(self.timeout, self.service.complete(model, prompt))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(ScoutError::Generation(msg))) => return Err(ScoutError::Generation(msg)),
            Ok(Err(other)) => return Err(ScoutError::Generation(other.to_string())),
            Err(_) => {
                return Err(ScoutError::Generation(format!(
                    "model '{}' timed out after {}s",
                    model,
                    self.timeout.as_secs()
                )))
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ScoutError::Generation(format!(
                "model '{}' returned an empty response",
                model
            )));
        }
        Ok(text.to_string())
    }

    /// Like [`Llm::complete`], but failure is a value rather than an error.
    pub async fn generate(&self, profile: ModelProfile, prompt: &str) -> Generated {
        match self.complete(profile, prompt).await {
            Ok(text) => Generated::Text(text),
            Err(ScoutError::Generation(reason)) => {
                tracing::warn!(error = %reason, "model call failed, using placeholder");
                Generated::Failed(reason)
            }
            Err(other) => Generated::Failed(other.to_string()),
        }
    }
}

// ============ Ollama ============

/// Completion service backed by a local Ollama instance.
///
/// Requires Ollama to be running with the configured models pulled
/// (e.g. `ollama pull llama3`).
pub struct OllamaClient {
    client: reqwest::Client,
    url: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            client: http_client(config)?,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ScoutError::Generation(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ScoutError::Generation(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScoutError::Generation(e.to_string()))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ScoutError::Generation("Invalid Ollama response: missing message.content".to_string())
        })
}

// ============ OpenAI ============

/// Completion service for the OpenAI chat completions API or any server
/// that speaks it. Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ScoutError::BadRequest("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        Ok(Self {
            client: http_client(config)?,
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.1,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoutError::Generation(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ScoutError::Generation(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScoutError::Generation(e.to_string()))?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ScoutError::Generation(
                "Invalid OpenAI response: missing choices[0].message.content".to_string(),
            )
        })
}

fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ScoutError::Generation(e.to_string()))
}

/// Create the configured [`CompletionService`].
pub fn create_service(config: &LlmConfig) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaClient::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiClient::new(config)?)),
        other => Err(ScoutError::BadRequest(format!(
            "Unknown llm provider: {}",
            other
        ))),
    }
}
