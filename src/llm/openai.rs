//! OpenAI chat completions backend.

use super::{CompletionRequest, ContentProvider, Role, TextStream, sse};
use crate::config::OpenAiConfig;
use crate::error::{ConfigError, ProviderError};
use crate::http_client::HttpClient;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

const DONE_MARKER: &str = "[DONE]";

pub struct OpenAiProvider {
    http: Arc<dyn HttpClient>,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn from_config(config: &OpenAiConfig, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredentials {
                provider: "OpenAI",
                hint: "Run `llm-tool config set-api-key openai <key>` or export OPENAI_API_KEY.",
            })?;

        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for message in &request.messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": message.content}));
        }

        json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": messages,
            "stream": stream,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn parse_response(body: &str) -> Result<String, ProviderError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Malformed("no response from OpenAI API".to_string()))
}

/// Text carried by one streamed chunk; role-only and finish chunks carry none.
fn parse_chunk(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: ChunkResponse =
        serde_json::from_str(data).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty()))
}

#[async_trait]
impl ContentProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let auth = format!("Bearer {}", self.api_key);
        let headers = [("Authorization", auth.as_str())];

        info!("Requesting OpenAI completion");
        let body = self.http.post_json(&self.url(), &headers, &self.body(request, false)).await?;
        parse_response(&body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ProviderError> {
        let auth = format!("Bearer {}", self.api_key);
        let headers = [("Authorization", auth.as_str())];

        info!("Requesting streamed OpenAI completion");
        let bytes = self
            .http
            .post_json_stream(&self.url(), &headers, &self.body(request, true))
            .await?;

        Ok(sse::events(bytes)
            .take_while(|event| future::ready(!matches!(event, Ok(data) if data.trim() == DONE_MARKER)))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(data) => parse_chunk(&data).transpose(),
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed())
    }
}
