//! Completion provider implementations.
//!
//! Mirrors [`crate::embedding`]: a disabled provider, an OpenAI chat
//! completions client, and an Ollama `/api/chat` client, selected by
//! [`create_provider`].

use anyhow::{bail, Result};
use async_trait::async_trait;

use lore_core::completion::CompletionProvider;

use crate::config::CompletionConfig;
use crate::http::{openai_api_key, JsonEndpoint};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const SYSTEM_PROMPT: &str = "You answer questions using the provided context. \
The context holds documentation sections and earlier conversation turns separated by '---'. \
If the context does not contain the answer, say so.";

/// Build the chat messages sent to either backend.
fn messages(context: &str, query: &str) -> serde_json::Value {
    let user = if context.is_empty() {
        query.to_string()
    } else {
        format!("Context:\n{}\n\nQuestion: {}", context, query)
    };
    serde_json::json!([
        {"role": "system", "content": SYSTEM_PROMPT},
        {"role": "user", "content": user}
    ])
}

pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _context: &str, _query: &str) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

/// OpenAI `POST /v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    model: String,
    endpoint: JsonEndpoint,
}

impl OpenAIProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        let endpoint = JsonEndpoint::new(
            "OpenAI",
            OPENAI_CHAT_URL.to_string(),
            Some(openai_api_key()?),
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self { model, endpoint })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn complete(&self, context: &str, query: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages(context, query),
        });
        let json = self.endpoint.post(&body).await?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
    }
}

/// Ollama `POST /api/chat` with streaming disabled.
pub struct OllamaProvider {
    model: String,
    endpoint: JsonEndpoint,
}

impl OllamaProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        let url = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        let endpoint = JsonEndpoint::new(
            "Ollama",
            format!("{}/api/chat", url.trim_end_matches('/')),
            None,
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self { model, endpoint })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn complete(&self, context: &str, query: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages(context, query),
            "stream": false,
        });
        let json = self.endpoint.post(&body).await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))
    }
}

pub fn create_provider(config: &CompletionConfig) -> Result<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
