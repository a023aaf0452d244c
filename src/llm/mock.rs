//! Offline backend with deterministic output.
//!
//! Refactor requests come back as the original content with one comment
//! line naming the instructions on top. Any other prompt is echoed.

use super::{CompletionRequest, ContentProvider, TextStream};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::debug;

const INSTRUCTIONS_MARKER: &str = "Instructions:\n";
const FILENAME_MARKER: &str = "\n\nFilename: ";
const CONTENT_MARKER: &str = "Content:\n";
const TRAILER_MARKER: &str = "\n\nPlease provide the complete refactored file content";

#[derive(Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    fn respond(&self, request: &CompletionRequest) -> String {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        match split_refactor_prompt(prompt) {
            Some((instructions, content)) => {
                let mut out = format!("// llm-tool: {}\n", instructions.lines().next().unwrap_or(""));
                out.push_str(content);
                if !content.is_empty() && !content.ends_with('\n') {
                    out.push('\n');
                }
                out
            }
            None => format!("Mock response to: {}\n", prompt.trim()),
        }
    }
}

fn split_refactor_prompt(prompt: &str) -> Option<(&str, &str)> {
    let start = prompt.find(INSTRUCTIONS_MARKER)? + INSTRUCTIONS_MARKER.len();
    let end = start + prompt[start..].find(FILENAME_MARKER)?;
    let body = prompt.find(CONTENT_MARKER)? + CONTENT_MARKER.len();
    let tail = prompt.rfind(TRAILER_MARKER)?;
    if body > tail {
        return None;
    }
    Some((&prompt[start..end], &prompt[body..tail]))
}

#[async_trait]
impl ContentProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        debug!("Mock provider answering");
        Ok(self.respond(request))
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, ProviderError> {
        let fragments: Vec<Result<String, ProviderError>> = self
            .respond(request)
            .split_inclusive('\n')
            .map(|line| Ok(line.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}
