use crate::error::ConfigError;
use crate::output::ColorMode;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GATEWAY_ENDPOINT: &str = "http://ai.api.us.cboe.net:5005";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub color: ColorMode,
    #[serde(skip)]
    pub use_mock: bool,
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Email/token authenticated chat gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            request_timeout_secs: None,
            color: ColorMode::Auto,
            use_mock: false,
            openai: OpenAiConfig::default(),
            gemini: GeminiConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            email: None,
            token: None,
            endpoint: DEFAULT_GATEWAY_ENDPOINT.to_string(),
            model: "default".to_string(),
            datasource: None,
        }
    }
}

impl Config {
    /// Load configuration from file, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Environment variables override the config file.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = var("GEMINI_API_KEY").filter(|v| !v.is_empty()) {
            self.gemini.api_key = Some(key);
        }
        if let Some(provider) = var("LLM_TOOL_PROVIDER").filter(|v| !v.is_empty()) {
            self.default_provider = provider;
        }
        if var("LLM_TOOL_USE_MOCK").is_some() {
            self.use_mock = true;
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(write_err)?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// `~/.config/llm-tool`, or `LLM_TOOL_CONFIG_DIR` when set.
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os("LLM_TOOL_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let home = home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".config").join("llm-tool"))
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Provider to use when none is given on the command line.
    pub fn provider_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        if self.use_mock {
            return "mock";
        }
        requested
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_provider)
    }

    pub fn set_api_key(&mut self, provider: &str, api_key: String) -> Result<(), ConfigError> {
        match provider {
            "openai" => self.openai.api_key = Some(api_key),
            "gemini" => self.gemini.api_key = Some(api_key),
            other => return Err(ConfigError::UnknownProvider(other.to_string())),
        }
        self.save()?;
        info!("API key for {} saved to config file", provider);
        Ok(())
    }

    pub fn show_config_info(&self) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path()?;
        let set = |value: &Option<String>| if value.is_some() { "Set" } else { "Not set" };

        println!("Configuration file: {}", config_path.display());
        println!(
            "Status: {}",
            if config_path.exists() { "Found" } else { "Not found (using defaults)" }
        );
        println!("Default provider: {}", self.default_provider);
        println!("OpenAI API key: {} (model {})", set(&self.openai.api_key), self.openai.model);
        println!("Gemini API key: {} (model {})", set(&self.gemini.api_key), self.gemini.model);
        println!(
            "Gateway credentials: {} (endpoint {})",
            if self.gateway.email.is_some() && self.gateway.token.is_some() { "Set" } else { "Not set" },
            self.gateway.endpoint
        );
        println!("\nTo set an API key:");
        println!("  llm-tool config set-api-key openai <your-key>");
        println!("\nOr set environment variable:");
        println!("  export OPENAI_API_KEY=<your-key>");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::load_from(&temp.path().join("config.toml")).unwrap();

        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.openai.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gateway.endpoint, DEFAULT_GATEWAY_ENDPOINT);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "default_provider = \"gemini\"\n[gemini]\napi_key = \"g-key\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.gemini.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.openai.model, DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "default_provider = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_save_creates_parent_and_round_trips_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.gateway.email = Some("dev@example.com".to_string());
        config.gateway.token = Some("tok".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.gateway.email.as_deref(), Some("dev@example.com"));
        assert_eq!(loaded.gateway.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-env"),
            ("LLM_TOOL_PROVIDER", "gemini"),
            ("LLM_TOOL_USE_MOCK", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.openai.api_key = Some("sk-file".to_string());
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.default_provider, "gemini");
        assert!(config.use_mock);
    }

    #[test]
    fn test_empty_env_key_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|key| (key == "OPENAI_API_KEY").then(String::new));
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_provider_name_prefers_request_then_default() {
        let config = Config::default();
        assert_eq!(config.provider_name(Some("gemini")), "gemini");
        assert_eq!(config.provider_name(Some("")), "openai");
        assert_eq!(config.provider_name(None), "openai");
    }

    #[test]
    fn test_mock_mode_forces_mock_provider() {
        let config = Config {
            use_mock: true,
            ..Config::default()
        };
        assert_eq!(config.provider_name(Some("openai")), "mock");
    }
}
