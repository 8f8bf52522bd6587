//! Generative text capability and its LLM provider bindings.
//!
//! The pipeline only needs "prompt in, text out", expressed as the
//! [`TextGenerator`] trait. [`LlmClient`] implements it over HTTP for several
//! hosted and local providers.
//!
//! # Supported Providers
//!
//! | Provider | Endpoint | Authentication |
//! |----------|----------|----------------|
//! | Gemini | `generativelanguage.googleapis.com` | x-goog-api-key header |
//! | OpenAI | `api.openai.com` | Bearer token |
//! | Anthropic | `api.anthropic.com` | x-api-key header |
//! | Ollama | Local (configurable) | None |
//!
//! # Model Fallback
//!
//! [`LlmClient::select_model`] walks an ordered list of candidate models,
//! probes each one against the provider and keeps the first that answers.
//!
//! # Retry Behavior
//!
//! Transient transport errors (timeouts, 429, 5xx) can be retried with
//! exponential backoff. The default [`RetryConfig`] performs no retries.
//!
//! # Example
//!
//! ```
//! use nl2sql_analyst::{
//!     config::RetryConfig,
//!     llm::{LlmClient, LlmProvider}
//! };
//!
//! let provider = LlmProvider::Ollama {
//!     base_url: "http://localhost:11434".into(),
//!     model:    "llama3.2".into()
//! };
//!
//! let client = LlmClient::with_retry_config(provider, RetryConfig::default());
//! assert_eq!(client.provider().model(), "llama3.2");
//! ```

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    config::RetryConfig,
    error::{AppResult, http_error, llm_api_error}
};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini models, in order of preference
pub const GEMINI_FALLBACK_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-001",
    "gemini-2.0-flash-lite",
    "gemini-pro-latest",
    "gemini-flash-latest"
];

/// "Given a prompt, return generated text."
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

/// LLM provider configuration with authentication credentials.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Google Gemini API
    Gemini {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "gemini-2.0-flash")
        model:   String
    },
    /// OpenAI API (GPT-4, GPT-3.5, etc.)
    OpenAI {
        /// API key (sk-...)
        api_key: String,
        /// Model identifier (e.g., "gpt-4", "gpt-3.5-turbo")
        model:   String
    },
    /// Anthropic API (Claude models)
    Anthropic {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "claude-sonnet-4-20250514")
        model:   String
    },
    /// Local Ollama instance
    Ollama {
        /// Base URL (e.g., "http://localhost:11434")
        base_url: String,
        /// Model name (e.g., "llama3.2", "codellama")
        model:    String
    }
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini { .. } => "Gemini",
            Self::OpenAI { .. } => "OpenAI",
            Self::Anthropic { .. } => "Anthropic",
            Self::Ollama { .. } => "Ollama"
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini { model, .. }
            | Self::OpenAI { model, .. }
            | Self::Anthropic { model, .. }
            | Self::Ollama { model, .. } => model
        }
    }

    /// Same provider and credentials, different model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        let mut provider = self.clone();
        match &mut provider {
            Self::Gemini { model: m, .. }
            | Self::OpenAI { model: m, .. }
            | Self::Anthropic { model: m, .. }
            | Self::Ollama { model: m, .. } => *m = model.into()
        }
        provider
    }
}

/// HTTP client for LLM API communication with retry support.
///
/// Handles provider-specific request formatting and response parsing.
pub struct LlmClient {
    provider:     LlmProvider,
    client:       reqwest::Client,
    retry_config: RetryConfig
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>
}

#[derive(Serialize)]
struct OpenAIRequest {
    model:    String,
    messages: Vec<OpenAIRequestMessage>
}

#[derive(Serialize)]
struct OpenAIRequestMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: String
}

#[derive(Serialize)]
struct AnthropicRequest {
    model:      String,
    max_tokens: u32,
    messages:   Vec<AnthropicMessage>
}

#[derive(Serialize)]
struct AnthropicMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String
}

#[derive(Serialize)]
struct OllamaRequest {
    model:  String,
    prompt: String,
    stream: bool
}

#[derive(Serialize)]
struct OllamaShowRequest {
    model: String
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String
}

impl LlmClient {
    /// Create new LLM client with default retry configuration
    pub fn new(provider: LlmProvider) -> Self {
        Self::with_retry_config(provider, RetryConfig::default())
    }

    /// Create new LLM client with custom retry configuration
    pub fn with_retry_config(provider: LlmProvider, retry_config: RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            provider,
            client,
            retry_config
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Build a client for the first candidate model the provider accepts.
    ///
    /// An empty candidate list keeps the provider's own model unprobed.
    pub async fn select_model(
        provider: LlmProvider,
        candidates: &[String],
        retry_config: RetryConfig
    ) -> AppResult<Self> {
        if candidates.is_empty() {
            return Ok(Self::with_retry_config(provider, retry_config));
        }
        let probe_client = Self::with_retry_config(provider.clone(), RetryConfig::default());
        let model = first_available(candidates, |model| {
            let candidate = probe_client.provider.with_model(model);
            let client = &probe_client;
            async move { client.probe(&candidate).await }
        })
        .await?;
        info!(provider = provider.name(), model, "model selected");
        Ok(Self::with_retry_config(provider.with_model(model), retry_config))
    }

    /// Check that the provider knows `provider`'s model
    async fn probe(&self, provider: &LlmProvider) -> AppResult<()> {
        let request = match provider {
            LlmProvider::Gemini {
                api_key,
                model
            } => self
                .client
                .get(format!("{}/{}", GEMINI_API_URL, gemini_model_path(model)))
                .header("x-goog-api-key", api_key),
            LlmProvider::OpenAI {
                api_key,
                model
            } => self
                .client
                .get(format!("https://api.openai.com/v1/models/{}", model))
                .header("Authorization", format!("Bearer {}", api_key)),
            LlmProvider::Anthropic {
                api_key,
                model
            } => self
                .client
                .get(format!("https://api.anthropic.com/v1/models/{}", model))
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01"),
            LlmProvider::Ollama {
                base_url,
                model
            } => self
                .client
                .post(format!("{}/api/show", base_url.trim_end_matches('/')))
                .json(&OllamaShowRequest {
                    model: model.clone()
                })
        };
        let response = request.send().await.map_err(http_error)?;
        if !response.status().is_success() {
            return Err(llm_api_error(format!(
                "{} model '{}' unavailable: {}",
                provider.name(),
                provider.model(),
                response.status()
            )));
        }
        Ok(())
    }

    async fn call_with_retry(&self, prompt: &str) -> AppResult<String> {
        let mut last_error = None;
        let mut delay = self.retry_config.initial_delay_ms;
        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                warn!(
                    attempt = attempt + 1,
                    of = self.retry_config.max_retries + 1,
                    delay_ms = delay,
                    "retrying LLM request"
                );
                sleep(Duration::from_millis(delay)).await;
                delay = ((delay as f64 * self.retry_config.backoff_factor) as u64)
                    .min(self.retry_config.max_delay_ms);
            }
            match self.call_provider(prompt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if is_retryable(&e.to_string()) {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| llm_api_error("All retry attempts failed")))
    }

    async fn call_provider(&self, prompt: &str) -> AppResult<String> {
        debug!(provider = self.provider.name(), chars = prompt.len(), "sending prompt");
        match &self.provider {
            LlmProvider::Gemini {
                api_key,
                model
            } => self.call_gemini(api_key, model, prompt).await,
            LlmProvider::OpenAI {
                api_key,
                model
            } => self.call_openai(api_key, model, prompt).await,
            LlmProvider::Anthropic {
                api_key,
                model
            } => self.call_anthropic(api_key, model, prompt).await,
            LlmProvider::Ollama {
                base_url,
                model
            } => self.call_ollama(base_url, model, prompt).await
        }
    }

    async fn call_gemini(&self, api_key: &str, model: &str, prompt: &str) -> AppResult<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string()
                }]
            }]
        };
        let url = format!(
            "{}/{}:generateContent",
            GEMINI_API_URL,
            gemini_model_path(model)
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Gemini API error {}: {}",
                status, text
            )));
        }
        let result: GeminiResponse = response.json().await.map_err(http_error)?;
        gemini_text(result)
    }

    async fn call_openai(&self, api_key: &str, model: &str, prompt: &str) -> AppResult<String> {
        let request = OpenAIRequest {
            model:    model.to_string(),
            messages: vec![OpenAIRequestMessage {
                role:    String::from("user"),
                content: prompt.to_string()
            }]
        };
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "OpenAI API error {}: {}",
                status, text
            )));
        }
        let result: OpenAIResponse = response.json().await.map_err(http_error)?;
        result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| llm_api_error("Empty response from OpenAI"))
    }

    async fn call_anthropic(&self, api_key: &str, model: &str, prompt: &str) -> AppResult<String> {
        let request = AnthropicRequest {
            model:      model.to_string(),
            max_tokens: 4096,
            messages:   vec![AnthropicMessage {
                role:    String::from("user"),
                content: prompt.to_string()
            }]
        };
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Anthropic API error {}: {}",
                status, text
            )));
        }
        let result: AnthropicResponse = response.json().await.map_err(http_error)?;
        result
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| llm_api_error("Empty response from Anthropic"))
    }

    async fn call_ollama(&self, base_url: &str, model: &str, prompt: &str) -> AppResult<String> {
        let request = OllamaRequest {
            model:  model.to_string(),
            prompt: prompt.to_string(),
            stream: false
        };
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Ollama API error {}: {}",
                status, text
            )));
        }
        let result: OllamaResponse = response.json().await.map_err(http_error)?;
        Ok(result.response)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        self.call_with_retry(prompt).await
    }
}

/// First candidate for which `probe` succeeds, in list order.
///
/// Each failure is logged; if every candidate fails the error names them all.
pub async fn first_available<'a, F, Fut>(candidates: &'a [String], mut probe: F) -> AppResult<&'a str>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = AppResult<()>>
{
    for candidate in candidates {
        match probe(candidate.as_str()).await {
            Ok(()) => return Ok(candidate.as_str()),
            Err(e) => warn!(model = %candidate, error = %e, "model unavailable, trying next")
        }
    }
    Err(llm_api_error(format!(
        "No usable model among: {}",
        candidates.join(", ")
    )))
}

/// Text of the first candidate, parts joined in order
fn gemini_text(response: GeminiResponse) -> AppResult<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(llm_api_error("Empty response from Gemini"));
    }
    Ok(text)
}

/// Gemini resource path; accepts names with or without the `models/` prefix
fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn is_retryable(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("timeout")
        || msg.contains("connection")
        || msg.contains("429")
        || msg.contains("rate limit")
        || msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
}
