//! Chat gateway backend authenticated with an email address and token.
//!
//! The gateway answers `/chat` with a single JSON document and
//! `/chat_stream` with server-sent events. Stream payloads are usually JSON
//! objects carrying an `answer` fragment, but plain text payloads are passed
//! through as they are.

use super::{CitedAnswer, CompletionRequest, ContentProvider, Role, Source, TextStream, sse};
use crate::config::GatewayConfig;
use crate::error::{ConfigError, ProviderError};
use crate::http_client::HttpClient;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

pub struct GatewayProvider {
    http: Arc<dyn HttpClient>,
    email: String,
    token: String,
    endpoint: String,
    datasource: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    error: Option<String>,
}

impl GatewayProvider {
    pub fn from_config(config: &GatewayConfig, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        let missing = ConfigError::MissingCredentials {
            provider: "Gateway",
            hint: "Run `llm-tool config setup-gateway --email <email> --token <token>`.",
        };
        let (Some(email), Some(token)) = (
            config.email.clone().filter(|e| !e.is_empty()),
            config.token.clone().filter(|t| !t.is_empty()),
        ) else {
            return Err(missing);
        };

        Ok(Self {
            http,
            email,
            token,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            datasource: config.datasource.clone().filter(|d| !d.is_empty()),
        })
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": [{"text": system}]}));
        }
        for message in &request.messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": [{"text": message.content}]}));
        }

        let mut body = json!({
            "messages": messages,
            "email": self.email,
            "token": self.token,
        });
        if let Some(name) = &self.datasource {
            body["datasources"] = json!([{"name": name, "custom": true}]);
        }
        body
    }
}

fn parse_response(body: &str) -> Result<CitedAnswer, ProviderError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(ProviderError::Api(error));
    }
    Ok(CitedAnswer {
        text: response.answer,
        sources: response.sources,
    })
}

/// Text of one stream payload: the `answer` field of a JSON object, or the
/// payload itself.
fn stream_fragment(data: String) -> String {
    match serde_json::from_str::<Value>(&data) {
        Ok(Value::Object(map)) => match map.get("answer") {
            Some(Value::String(answer)) => answer.clone(),
            _ => data,
        },
        _ => data,
    }
}

/// Formats cited sources as a numbered list under a `=== Sources ===` header.
pub fn format_sources(sources: &[Source]) -> String {
    let mut out = String::from("\n\n=== Sources ===\n");
    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, source.name));
        if let Some(url) = source.url.as_deref().filter(|u| !u.is_empty()) {
            out.push_str(&format!("   URL: {}\n", url));
        }
    }
    out
}

/// Registers `token` for `email` with the gateway. Returns the gateway's reply.
pub async fn setup_token(
    http: &dyn HttpClient,
    endpoint: &str,
    email: &str,
    token: &str,
) -> Result<String, ProviderError> {
    let url = format!("{}/setup_token", endpoint.trim_end_matches('/'));
    info!("Registering gateway token for {}", email);
    http.post_json(&url, &[], &json!({"email": email, "token": token}))
        .await
}

#[async_trait]
impl ContentProvider for GatewayProvider {
    fn name(&self) -> &str {
        "gateway"
    }

    fn cites_sources(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        Ok(self.complete_cited(request).await?.text)
    }

    async fn complete_cited(&self, request: &CompletionRequest) -> Result<CitedAnswer, ProviderError> {
        info!("Requesting gateway completion");
        let url = format!("{}/chat", self.endpoint);
        let body = self.http.post_json(&url, &[], &self.body(request)).await?;
        parse_response(&body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ProviderError> {
        info!("Requesting streamed gateway completion");
        let url = format!("{}/chat_stream", self.endpoint);
        let bytes = self.http.post_json_stream(&url, &[], &self.body(request)).await?;

        Ok(sse::events(bytes)
            .filter_map(|event| {
                future::ready(match event.map(stream_fragment) {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                })
            })
            .boxed())
    }
}
