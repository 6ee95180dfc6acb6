//! The `CompletionEngine` trait and its HTTP implementation.
//!
//! [`ApiCompletionEngine`] talks to any server exposing the OpenAI-compatible
//! `/v1/models` and `/v1/completions` endpoints: Ollama, the llama.cpp
//! server, LM Studio, vLLM.  The raw ChatML prompt built by
//! [`ContextWindow`](crate::llm::ContextWindow) is sent as-is and generation
//! stops at the first `<|im_end|>`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::llm::context::BLOCK_END;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors from loading or running a completion engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The HTTP client could not be built from the configuration.
    #[error("invalid LLM client configuration: {0}")]
    Client(String),

    /// Transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("completion request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("failed to parse completion response: {0}")]
    Parse(String),

    /// The configured model is not served by the backend.
    #[error("model '{model}' not available (server lists: {available})")]
    ModelUnavailable { model: String, available: String },

    /// Generation produced no usable text.
    #[error("model returned an empty completion")]
    EmptyResponse,
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EngineError::Timeout
        } else if e.is_decode() {
            EngineError::Parse(e.to_string())
        } else {
            EngineError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionEngine trait
// ---------------------------------------------------------------------------

/// Prompt in, generated text out.
///
/// Implementors are shared as `Arc<dyn CompletionEngine>`, hence
/// `Send + Sync`.  A call may take arbitrarily long; callers do not cancel it.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// Cut `raw` at the first end-of-block marker and trim it.
///
/// Returns `None` when nothing is left.
pub fn clean_completion(raw: &str) -> Option<String> {
    let text = match raw.find(BLOCK_END) {
        Some(end) => &raw[..end],
        None => raw,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// ---------------------------------------------------------------------------
// ApiCompletionEngine
// ---------------------------------------------------------------------------

/// Completion engine backed by an OpenAI-compatible HTTP server.
///
/// No URLs are hardcoded; everything comes from [`LlmConfig`].
pub struct ApiCompletionEngine {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiCompletionEngine {
    /// Build the client without contacting the server.
    ///
    /// `timeout_secs == 0` leaves the client without a request timeout.
    /// Fails when `base_url` is not an absolute URL or the TLS backend
    /// cannot be initialised.
    pub fn from_config(config: &LlmConfig) -> Result<Self, EngineError> {
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| EngineError::Client(format!("base_url '{}': {e}", config.base_url)))?;

        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| EngineError::Client(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Build the engine and verify the configured model is served.
    pub async fn load(config: &LlmConfig) -> Result<Self, EngineError> {
        let engine = Self::from_config(config)?;
        engine.check_model().await?;
        log::info!(
            "llm: model '{}' ready at {}",
            engine.config.model,
            engine.config.base_url
        );
        Ok(engine)
    }

    /// `GET /v1/models` and check the configured model is listed.
    pub async fn check_model(&self) -> Result<(), EngineError> {
        let url = self.endpoint("models");
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_status(response).await?;
        let list: ModelList = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        if list.data.iter().any(|m| m.id == self.config.model) {
            return Ok(());
        }
        let available = list
            .data
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Err(EngineError::ModelUnavailable {
            model: self.config.model.clone(),
            available,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Attach `Authorization: Bearer …` only for a non-empty key.
    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EngineError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CompletionEngine for ApiCompletionEngine {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "model":       self.config.model,
            "prompt":      prompt,
            "max_tokens":  self.config.max_tokens,
            "temperature": self.config.temperature,
            "stop":        [BLOCK_END],
            "stream":      false
        });

        let started = std::time::Instant::now();
        let response = self
            .authorize(self.client.post(self.endpoint("completions")).json(&body))
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .unwrap_or_default();
        let text = clean_completion(&raw).ok_or(EngineError::EmptyResponse)?;

        log::debug!(
            "llm: {} chars generated in {} ms",
            text.len(),
            started.elapsed().as_millis()
        );
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// ScriptedEngine  (test-only)
// ---------------------------------------------------------------------------

/// Test double that replays a fixed list of results and records prompts.
///
/// Once the script runs out the last result is repeated.
#[cfg(test)]
pub struct ScriptedEngine {
    results: std::sync::Mutex<std::collections::VecDeque<Result<String, EngineError>>>,
    last: std::sync::Mutex<Option<Result<String, EngineError>>>,
    prompts: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedEngine {
    pub fn new(results: Vec<Result<String, EngineError>>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into()),
            last: std::sync::Mutex::new(None),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn err(error: EngineError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.results.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last.clone().unwrap_or(Err(EngineError::EmptyResponse)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
