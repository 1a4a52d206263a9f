//! Core data models used throughout Summer.
//!
//! These types represent the extracted page text, the request sent to the
//! summarization backend, and the records kept in history.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An interchangeable summarization backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Groq,
    Watsonx,
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Groq,
        Provider::Watsonx,
        Provider::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
            Provider::Watsonx => "watsonx",
            Provider::Ollama => "ollama",
        }
    }

    /// Case-insensitive lookup by identifier.
    pub fn parse(s: &str) -> Option<Provider> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::parse(s).ok_or_else(|| {
            format!(
                "unknown provider '{}': expected openai, groq, watsonx, or ollama",
                s
            )
        })
    }
}

/// Normalized main-content text of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    content: String,
    length: usize,
}

impl ExtractedText {
    pub fn new(content: String) -> Self {
        let length = content.chars().count();
        Self { content, length }
    }

    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Length in characters; always equal to `content().chars().count()`.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// Payload for `POST {backend}/summarize`.
///
/// Watsonx-only fields are omitted from the JSON for other providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummarizationRequest {
    pub provider: Provider,
    pub model: String,
    pub apikey: String,
    pub instructions: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watsonx_url: Option<String>,
}

/// One persisted result of a successful summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub summary: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default = "unknown")]
    pub provider: String,
    #[serde(default = "unknown")]
    pub model: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

impl SummaryRecord {
    pub fn new(summary: String, provider: Provider, model: &str) -> Self {
        Self {
            summary,
            timestamp: chrono::Utc::now().timestamp_millis(),
            provider: provider.as_str().to_string(),
            model: model.to_string(),
        }
    }
}
