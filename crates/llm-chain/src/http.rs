//! HTTP clients for OpenAI-compatible chat completions and the Anthropic
//! messages API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::TextProvider;
use crate::types::GenerationRequest;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
    /// `POST {base_url}/chat/completions` (OpenAI, OpenRouter, local servers).
    #[serde(rename = "openai")]
    OpenAi,
    /// `POST {base_url}/v1/messages`.
    Anthropic,
}

/// Where a named provider lives and which env var holds its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub api: ApiStyle,
    pub base_url: String,
    pub api_key_env: String,
}

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<MessagesBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessagesBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

// ─── HttpProvider ─────────────────────────────────────────────────────────

pub struct HttpProvider {
    name: String,
    api: ApiStyle,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, api: ApiStyle, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Build from an endpoint, reading the key from its env var. A missing key
    /// is not an error here; calls fail with a `Provider` error instead, so
    /// the chain moves on to the next candidate.
    pub fn from_endpoint(name: impl Into<String>, endpoint: &ProviderEndpoint) -> Self {
        let api_key = std::env::var(&endpoint.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(name, endpoint.api, endpoint.base_url.clone(), api_key)
    }

    pub fn api(&self) -> ApiStyle {
        self.api
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Provider(format!("no API key configured for '{}'", self.name)))
    }

    async fn send(&self, req: reqwest::RequestBuilder, timeout: Duration) -> Result<String, ProviderError> {
        let response = req.timeout(timeout).send().await.map_err(classify_transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport)?;
        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body));
        }
        Ok(body)
    }

    async fn chat_completions(
        &self,
        model: &str,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.prompt,
        });
        let payload = ChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.key()?)
            .json(&payload);

        let body = self.send(req, timeout).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Provider(format!("malformed chat completion: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::Provider("chat completion had no content".into()))
    }

    async fn messages(
        &self,
        model: &str,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let payload = MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            messages: vec![WireMessage {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system.as_deref(),
            temperature: request.temperature,
        };
        let req = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.key()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload);

        let body = self.send(req, timeout).await?;
        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Provider(format!("malformed messages response: {e}")))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|b| match b {
                MessagesBlock::Text { text } => Some(text),
                MessagesBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ProviderError::Provider("messages response had no text".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        model: &str,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        debug!(provider = %self.name, model, api = ?self.api, "calling provider");
        match self.api {
            ApiStyle::OpenAi => self.chat_completions(model, request, timeout).await,
            ApiStyle::Anthropic => self.messages(model, request, timeout).await,
        }
    }
}

/// Map a non-2xx status onto the retry classification.
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    let detail = format!("HTTP {status}: {}", snippet(body));
    match status {
        429 | 503 => ProviderError::RateLimited(detail),
        408 | 504 => ProviderError::Timeout(detail),
        _ => ProviderError::Provider(detail),
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Provider(err.to_string())
    }
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
