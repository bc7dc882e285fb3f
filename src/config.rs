use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(LlmProvider::Openrouter),
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::Openai),
            other => anyhow::bail!("Unknown LLM provider: {}", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: String::new(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return self.base_url.trim_end_matches('/');
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// JSONL file receiving one record per in/out/error event.
    #[serde(default = "default_activity_log")]
    pub activity_log: PathBuf,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            activity_log: default_activity_log(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl RelayConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

fn default_model() -> String {
    "google/gemini-2.0-flash-001".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_activity_log() -> PathBuf {
    PathBuf::from("logs/activity.jsonl")
}

fn default_debounce_ms() -> u64 {
    900
}

impl Config {
    /// Load the optional TOML file at `path`, then apply environment overrides.
    /// A missing file is not an error; missing credentials are.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from file content and an environment lookup.
    pub fn from_sources<F>(content: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match content {
            Some(c) => toml::from_str(c).context("Failed to parse config file")?,
            None => Config::default(),
        };

        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = token;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            config.llm.api_key = key;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider
                .parse()
                .context("Invalid LLM_PROVIDER value")?;
        }
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = base_url;
        }
        if let Some(path) = lookup("ACTIVITY_LOG_PATH") {
            config.relay.activity_log = PathBuf::from(path);
        }
        if let Some(ms) = lookup("DEBOUNCE_MS") {
            config.relay.debounce_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("Invalid DEBOUNCE_MS value: {}", ms))?;
        }

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is missing. Set TELEGRAM_BOT_TOKEN or telegram.bot_token");
        }
        if config.llm.api_key.trim().is_empty() {
            anyhow::bail!("LLM API key is missing. Set LLM_API_KEY or llm.api_key");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_only_uses_defaults() {
        let config = Config::from_sources(
            None,
            env_from(&[("TELEGRAM_BOT_TOKEN", "tg"), ("LLM_API_KEY", "sk")]),
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token, "tg");
        assert_eq!(config.llm.api_key, "sk");
        assert_eq!(config.llm.model, "google/gemini-2.0-flash-001");
        assert_eq!(config.llm.provider, LlmProvider::Openrouter);
        assert_eq!(config.relay.debounce_window(), Duration::from_millis(900));
        assert_eq!(config.relay.activity_log, PathBuf::from("logs/activity.jsonl"));
    }

    #[test]
    fn test_missing_token_fails() {
        let err = Config::from_sources(None, env_from(&[("LLM_API_KEY", "sk")])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err =
            Config::from_sources(None, env_from(&[("TELEGRAM_BOT_TOKEN", "tg")])).unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[test]
    fn test_blank_env_value_counts_as_missing() {
        let result = Config::from_sources(
            None,
            env_from(&[("TELEGRAM_BOT_TOKEN", "  "), ("LLM_API_KEY", "sk")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_model_override() {
        let config = Config::from_sources(
            None,
            env_from(&[
                ("TELEGRAM_BOT_TOKEN", "tg"),
                ("LLM_API_KEY", "sk"),
                ("LLM_MODEL", "openai/gpt-4o-mini"),
            ]),
        )
        .unwrap();
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
    }

    #[test]
    fn test_file_values_overridden_by_env() {
        let toml = r#"
            [telegram]
            bot_token = "from-file"

            [llm]
            provider = "ollama"
            model = "llama3"
            api_key = "file-key"

            [relay]
            debounce_ms = 1500
            activity_log = "/tmp/relay.jsonl"
        "#;
        let config =
            Config::from_sources(Some(toml), env_from(&[("TELEGRAM_BOT_TOKEN", "from-env")]))
                .unwrap();
        assert_eq!(config.telegram.bot_token, "from-env");
        assert_eq!(config.llm.api_key, "file-key");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434/v1");
        assert_eq!(config.relay.debounce_ms, 1500);
        assert_eq!(config.relay.activity_log, PathBuf::from("/tmp/relay.jsonl"));
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let result = Config::from_sources(
            None,
            env_from(&[
                ("TELEGRAM_BOT_TOKEN", "tg"),
                ("LLM_API_KEY", "sk"),
                ("LLM_PROVIDER", "bard"),
            ]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_base_url_wins() {
        let llm = LlmConfig {
            base_url: "https://proxy.example.com/v1/".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.effective_base_url(), "https://proxy.example.com/v1");
    }
}
