//! Google Gemini backend over the public REST API.

use super::{CompletionRequest, ContentProvider, Role, TextStream, sse};
use crate::config::GeminiConfig;
use crate::error::{ConfigError, ProviderError};
use crate::http_client::HttpClient;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

const TEMPERATURE: f64 = 0.2;

pub struct GeminiProvider {
    http: Arc<dyn HttpClient>,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

impl GeminiProvider {
    pub fn from_config(config: &GeminiConfig, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredentials {
                provider: "Gemini",
                hint: "Run `llm-tool config set-api-key gemini <key>` or export GEMINI_API_KEY.",
            })?;

        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, request: &CompletionRequest, stream: bool) -> String {
        let model = request.model.as_deref().unwrap_or(&self.model);
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse&key={}",
                self.base_url, model, self.api_key
            )
        } else {
            format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key)
        }
    }

    fn body(request: &CompletionRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({"role": role, "parts": [{"text": message.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {"temperature": TEMPERATURE},
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        body
    }
}

fn decode(body: &str) -> Result<GenerateResponse, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))
}

fn parse_response(body: &str) -> Result<String, ProviderError> {
    decode(body)?
        .text()
        .ok_or_else(|| ProviderError::Malformed("no candidates in Gemini response".to_string()))
}

/// Text of one stream chunk. The closing chunk may carry only
/// `finishReason` or `usageMetadata`, which yields no text.
fn parse_chunk(data: &str) -> Result<String, ProviderError> {
    Ok(decode(data)?.text().unwrap_or_default())
}

#[async_trait]
impl ContentProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn keeps_history(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        info!("Requesting Gemini completion");
        let body = self
            .http
            .post_json(&self.url(request, false), &[], &Self::body(request))
            .await?;
        parse_response(&body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ProviderError> {
        info!("Requesting streamed Gemini completion");
        let bytes = self
            .http
            .post_json_stream(&self.url(request, true), &[], &Self::body(request))
            .await?;

        Ok(sse::events(bytes)
            .filter_map(|event| {
                future::ready(match event.and_then(|data| parse_chunk(&data)) {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                })
            })
            .boxed())
    }
}
