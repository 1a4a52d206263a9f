use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::Provider;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    /// Per-provider defaults, keyed by provider identifier.
    #[serde(default)]
    pub providers: HashMap<String, ProviderDefaults>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:5050".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/summer.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizeConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_model_history_limit")]
    pub model_history_limit: usize,
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            history_limit: default_history_limit(),
            model_history_limit: default_model_history_limit(),
            progress_tick_ms: default_progress_tick_ms(),
        }
    }
}

fn default_min_chars() -> usize {
    50
}
fn default_max_chars() -> usize {
    6000
}
fn default_history_limit() -> usize {
    10
}
fn default_model_history_limit() -> usize {
    5
}
fn default_progress_tick_ms() -> u64 {
    400
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProviderDefaults {
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Config {
    /// Config used when no file is present. Every section takes its defaults.
    pub fn minimal() -> Self {
        Self {
            backend: BackendConfig::default(),
            store: StoreConfig::default(),
            summarize: SummarizeConfig::default(),
            providers: HashMap::new(),
        }
    }

    /// Default model configured for `provider`, if any.
    pub fn default_model(&self, provider: Provider) -> Option<&str> {
        self.providers
            .get(provider.as_str())
            .and_then(|p| p.default_model.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate a TOML config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate backend
    let url = url::Url::parse(&config.backend.url)
        .with_context(|| format!("backend.url is not a valid URL: {}", config.backend.url))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("backend.url must use http or https, got '{}'", url.scheme());
    }
    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    // Validate summarize limits
    let s = &config.summarize;
    if s.max_chars == 0 {
        anyhow::bail!("summarize.max_chars must be > 0");
    }
    if s.min_chars > s.max_chars {
        anyhow::bail!(
            "summarize.min_chars ({}) must not exceed summarize.max_chars ({})",
            s.min_chars,
            s.max_chars
        );
    }
    if s.history_limit < 1 {
        anyhow::bail!("summarize.history_limit must be >= 1");
    }
    if s.model_history_limit < 1 {
        anyhow::bail!("summarize.model_history_limit must be >= 1");
    }
    if s.progress_tick_ms < 1 {
        anyhow::bail!("summarize.progress_tick_ms must be >= 1");
    }

    for name in config.providers.keys() {
        match Provider::parse(name) {
            Some(provider) if provider.as_str() == name.as_str() => {}
            Some(provider) => anyhow::bail!(
                "Provider section '{}' must be written in lowercase: [providers.{}]",
                name,
                provider
            ),
            None => anyhow::bail!(
                "Unknown provider section: '{}'. Must be openai, groq, watsonx, or ollama.",
                name
            ),
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.backend.url, "http://localhost:5050");
        assert_eq!(config.summarize.min_chars, 50);
        assert_eq!(config.summarize.max_chars, 6000);
        assert_eq!(config.summarize.history_limit, 10);
        assert_eq!(config.summarize.model_history_limit, 5);
        assert_eq!(config.summarize.progress_tick_ms, 400);
    }

    #[test]
    fn provider_defaults_are_read() {
        let config = parse_config(
            r#"
[providers.groq]
default_model = "llama-3.1-8b-instant"

[providers.ollama]
default_model = "  "
"#,
        )
        .unwrap();
        assert_eq!(
            config.default_model(Provider::Groq),
            Some("llama-3.1-8b-instant")
        );
        assert_eq!(config.default_model(Provider::Ollama), None);
        assert_eq!(config.default_model(Provider::OpenAi), None);
    }

    #[test]
    fn rejects_unknown_provider_section() {
        let err = parse_config("[providers.anthropic]\n").unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn rejects_mixed_case_provider_section() {
        let err = parse_config("[providers.OpenAI]\ndefault_model = \"gpt-4o\"\n").unwrap_err();
        assert!(err.to_string().contains("[providers.openai]"));
    }

    #[test]
    fn rejects_bad_backend_url() {
        assert!(parse_config("[backend]\nurl = \"not a url\"\n").is_err());
        assert!(parse_config("[backend]\nurl = \"ftp://example.com\"\n").is_err());
    }

    #[test]
    fn rejects_inverted_limits() {
        let err = parse_config("[summarize]\nmin_chars = 100\nmax_chars = 10\n").unwrap_err();
        assert!(err.to_string().contains("min_chars"));
    }
}
