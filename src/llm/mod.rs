//! Content providers: interchangeable LLM backends behind one capability.
//!
//! Every backend answers a [`CompletionRequest`] either in one piece
//! ([`ContentProvider::complete`]) or as an ordered stream of text fragments
//! ([`ContentProvider::stream`]). Concatenating the fragments gives the same
//! text as the complete call.
//!
//! Backends:
//!
//! - [`openai::OpenAiProvider`] - chat completions, streamed over SSE
//! - [`gemini::GeminiProvider`] - Gemini `generateContent`, chat-history aware
//! - [`gateway::GatewayProvider`] - email/token authenticated chat gateway
//! - [`mock::MockProvider`] - deterministic offline backend

pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod prompts;
pub mod sse;

use crate::config::Config;
use crate::error::{ConfigError, ProviderError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Ordered text fragments of a streamed response.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System instruction, if any.
    pub system: Option<String>,
    /// Conversation so far, ending with the user's prompt.
    pub messages: Vec<ChatMessage>,
    /// Model override; backends fall back to their configured model.
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.is_empty());
        self
    }
}

/// A reference the backend cites alongside its answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A complete answer with its cited sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitedAnswer {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Capability shared by every LLM backend.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Short backend name, as used in config and on the command line.
    fn name(&self) -> &str;

    /// Whether `ask` should carry a persisted conversation for this backend.
    fn keeps_history(&self) -> bool {
        false
    }

    /// Whether [`ContentProvider::complete_cited`] can return sources.
    fn cites_sources(&self) -> bool {
        false
    }

    /// Generates the full response in one round trip.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Like [`ContentProvider::complete`], keeping any sources the backend cites.
    async fn complete_cited(&self, request: &CompletionRequest) -> Result<CitedAnswer, ProviderError> {
        Ok(CitedAnswer {
            text: self.complete(request).await?,
            sources: Vec::new(),
        })
    }

    /// Generates the response as incrementally arriving fragments.
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ProviderError>;
}

/// Builds the backend named `name`.
///
/// # Errors
///
/// [`ConfigError::UnknownProvider`] for an unknown name and
/// [`ConfigError::MissingCredentials`] when the backend has no credentials.
pub fn select_provider(name: &str, config: &Config) -> Result<Box<dyn ContentProvider>, ConfigError> {
    let http = http_client(config)?;

    let provider: Box<dyn ContentProvider> = match name {
        "openai" => Box::new(openai::OpenAiProvider::from_config(&config.openai, http)?),
        "gemini" => Box::new(gemini::GeminiProvider::from_config(&config.gemini, http)?),
        "gateway" => Box::new(gateway::GatewayProvider::from_config(&config.gateway, http)?),
        "mock" => Box::new(mock::MockProvider::new()),
        other => return Err(ConfigError::UnknownProvider(other.to_string())),
    };

    info!("Using {} provider", provider.name());
    Ok(provider)
}

fn http_client(config: &Config) -> Result<Arc<dyn HttpClient>, ConfigError> {
    match config.request_timeout_secs {
        Some(secs) => ReqwestHttpClient::with_timeout(Duration::from_secs(secs))
            .map(|client| Arc::new(client) as Arc<dyn HttpClient>)
            .map_err(|e| ConfigError::HttpClient(e.to_string())),
        None => Ok(Arc::new(ReqwestHttpClient::new())),
    }
}

/// Drains `stream`, writing each fragment to `out` as it arrives, and
/// returns the assembled text.
pub async fn collect_stream<W: Write + ?Sized>(
    mut stream: TextStream,
    out: &mut W,
) -> Result<String, ProviderError> {
    let mut full = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        out.write_all(fragment.as_bytes())
            .and_then(|_| out.flush())
            .map_err(echo_failed)?;
        full.push_str(&fragment);
    }
    Ok(full)
}

fn echo_failed(e: std::io::Error) -> ProviderError {
    ProviderError::Stream(format!("failed to write output: {}", e))
}

/// Asks the provider for the complete new content of `filename`.
///
/// With `echo` set the response is streamed and written to `echo` as it
/// arrives. Either way only the assembled text is returned, with a single
/// surrounding code fence removed.
///
/// # Errors
///
/// Provider failures, and [`ProviderError::Empty`] when nothing usable
/// came back.
pub async fn generate(
    provider: &dyn ContentProvider,
    instructions: &str,
    filename: &str,
    content: &str,
    model: Option<String>,
    echo: Option<&mut (dyn Write + Send)>,
) -> Result<String, ProviderError> {
    let request = CompletionRequest::prompt(prompts::refactor_prompt(instructions, filename, content))
        .with_system(prompts::REFACTOR_SYSTEM)
        .with_model(model);

    let raw = match echo {
        Some(out) => {
            let text = collect_stream(provider.stream(&request).await?, &mut *out).await?;
            writeln!(out).map_err(echo_failed)?;
            text
        }
        None => provider.complete(&request).await?,
    };

    let cleaned = prompts::strip_code_fence(&raw);
    if cleaned.trim().is_empty() {
        return Err(ProviderError::Empty);
    }
    debug!("Generated {} bytes for {}", cleaned.len(), filename);
    Ok(cleaned)
}
