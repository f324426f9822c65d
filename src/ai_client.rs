//! Language-model client for checklist evaluation
//!
//! One completion per document, temperature pinned to zero. Two wire formats
//! are supported: OpenAI chat completions (also used for Ollama and other
//! compatible servers via `base_url`) and the Anthropic messages API.

use crate::checklist::Checklist;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    OpenAi,
    Anthropic,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "ollama" => Ok(BackendKind::OpenAi),
            "anthropic" | "claude" => Ok(BackendKind::Anthropic),
            other => Err(format!("Unknown LLM backend '{}' (expected openai or anthropic)", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Everything the evaluator needs to reach a model; no global state
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            backend: BackendKind::OpenAi,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn anthropic(api_key: Option<String>) -> Self {
        Self {
            backend: BackendKind::Anthropic,
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            api_key,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            temperature: 0.0,
            max_tokens: Some(1024),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Text-completion collaborator: (system, user) in, reply text out
#[allow(async_fn_in_trait)]
pub trait CompletionBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String>;
}

// ==================== OpenAI-compatible ====================

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageContent,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessageContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    total_tokens: u64,
}

pub struct OpenAiBackend {
    client: Client,
    config: LlmConfig,
}

impl OpenAiBackend {
    pub fn new(config: LlmConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }
}

impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system.to_string() },
                ChatMessage { role: "user".to_string(), content: user.to_string() },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut builder = self.client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| format!("OpenAI request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("OpenAI API error {}: {}", status, body));
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse OpenAI response: {}", e))?;

        if let Some(usage) = &api_response.usage {
            eprintln!("[LLM] {} tokens used", usage.total_tokens);
        }

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| "No response from OpenAI".to_string())
    }
}

// ==================== Anthropic ====================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub struct AnthropicBackend {
    client: Client,
    config: LlmConfig,
}

impl AnthropicBackend {
    pub fn new(config: LlmConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }
}

impl CompletionBackend for AnthropicBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let api_key = self.config.api_key.as_deref()
            .filter(|k| !k.is_empty())
            .ok_or("ANTHROPIC_API_KEY not set")?;

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens.unwrap_or(1024),
            system: system.to_string(),
            temperature: self.config.temperature,
            messages: vec![ChatMessage { role: "user".to_string(), content: user.to_string() }],
        };

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let response = self.client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, body));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if let Some(usage) = &api_response.usage {
            eprintln!("[LLM] {} input / {} output tokens", usage.input_tokens, usage.output_tokens);
        }

        Ok(api_response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

// ==================== Backend selection ====================

/// Backend chosen from configuration at runtime
pub enum LlmBackend {
    OpenAi(OpenAiBackend),
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    pub fn from_config(config: LlmConfig) -> Result<Self, String> {
        match config.backend {
            BackendKind::OpenAi => Ok(LlmBackend::OpenAi(OpenAiBackend::new(config)?)),
            BackendKind::Anthropic => Ok(LlmBackend::Anthropic(AnthropicBackend::new(config)?)),
        }
    }
}

impl CompletionBackend for LlmBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        match self {
            LlmBackend::OpenAi(b) => b.complete(system, user).await,
            LlmBackend::Anthropic(b) => b.complete(system, user).await,
        }
    }
}

// ==================== Evaluator ====================

/// Sends a document to the model with the checklist framing
pub struct Evaluator<B> {
    backend: B,
    system_prompt: String,
    user_prompt: String,
}

impl<B: CompletionBackend> Evaluator<B> {
    pub fn new(checklist: &Checklist, backend: B) -> Self {
        Self {
            backend,
            system_prompt: checklist.system_prompt().to_string(),
            user_prompt: checklist.user_prompt(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// User message: checklist instruction, blank line, document text
    pub fn user_message(&self, document_text: &str) -> String {
        format!("{}\n\n{}", self.user_prompt, document_text)
    }

    /// Raw model reply, or an empty string if the call failed
    pub async fn evaluate(&self, document_text: &str) -> String {
        match self.backend.complete(&self.system_prompt, &self.user_message(document_text)).await {
            Ok(text) => text,
            Err(e) => {
                eprintln!("[LLM] Error sending document to model: {}", e);
                String::new()
            }
        }
    }
}
