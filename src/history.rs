use crate::llm::ChatMessage;
use crate::providers::TimeProvider;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Messages kept after each exchange (ten user/assistant pairs).
pub const MAX_MESSAGES: usize = 20;

/// Conversation carried between `ask` invocations for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Unix timestamp of the last save.
    pub timestamp: u64,
}

impl ChatHistory {
    /// `<config_dir>/history/<provider>_chat_history.json`
    pub fn path_for(config_dir: &Path, provider: &str) -> PathBuf {
        config_dir
            .join("history")
            .join(format!("{}_chat_history.json", provider))
    }

    /// Loads the history at `path`. A missing file is an empty history.
    pub fn load(path: &Path, model: &str) -> Result<Self> {
        if !path.exists() {
            debug!("No chat history at {}", path.display());
            return Ok(Self {
                model: model.to_string(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read chat history {}", path.display()))?;
        let history: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse chat history {}", path.display()))?;
        debug!("Loaded {} history messages", history.messages.len());
        Ok(history)
    }

    /// Appends one exchange and keeps only the last [`MAX_MESSAGES`].
    pub fn record_exchange(&mut self, prompt: &str, answer: &str) {
        self.messages.push(ChatMessage::user(prompt));
        self.messages.push(ChatMessage::assistant(answer));
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }

    pub fn save(&mut self, path: &Path, clock: &dyn TimeProvider) -> Result<()> {
        self.timestamp = clock.now();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to save chat history {}", path.display()))?;
        info!("Saved chat history to {}", path.display());
        Ok(())
    }

    /// Deletes the history at `path`. Returns whether a file was removed.
    pub fn clear(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)
            .with_context(|| format!("failed to remove chat history {}", path.display()))?;
        info!("Cleared chat history at {}", path.display());
        Ok(true)
    }
}
