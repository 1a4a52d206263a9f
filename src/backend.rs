//! Client for the remote summarization backend.
//!
//! The backend is an opaque HTTP service exposing two endpoints:
//!
//! | Method | Path | Body / Response |
//! |--------|------|-----------------|
//! | `GET`  | `/providers` | JSON map of [`CapabilityFlags`](crate::providers::CapabilityFlags) per provider |
//! | `POST` | `/summarize` | [`SummarizationRequest`] → `{"summary": ...}` or `{"error": "..."}` |
//!
//! [`SummarizeBackend`] is the seam the orchestrator talks through;
//! [`HttpBackend`] is the `reqwest` implementation. Interpretation of the
//! summarize reply (status, `summary`, `error`) belongs to the orchestrator,
//! so the backend only separates transport failures from replies.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::models::SummarizationRequest;
use crate::providers::ProviderCapabilities;

/// A reply from `POST /summarize`, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub status: u16,
    /// Parsed JSON body; `None` when the body was not JSON.
    pub body: Option<Value>,
}

impl BackendReply {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait SummarizeBackend: Send + Sync {
    /// `GET /providers`.
    async fn fetch_providers(&self) -> Result<ProviderCapabilities>;

    /// `POST /summarize`. `Err` means the request never produced a reply
    /// (connection refused, DNS failure, timeout).
    async fn summarize(&self, request: &SummarizationRequest) -> Result<BackendReply>;

    /// Base URL, for error messages.
    fn base_url(&self) -> &str;
}

/// [`SummarizeBackend`] over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.backend.url,
            Duration::from_secs(config.backend.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl SummarizeBackend for HttpBackend {
    async fn fetch_providers(&self) -> Result<ProviderCapabilities> {
        let response = self
            .client
            .get(self.endpoint("providers"))
            .send()
            .await
            .with_context(|| format!("Backend not reachable at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET /providers returned {}", status);
        }

        let json: Value = response
            .json()
            .await
            .context("Invalid /providers response")?;
        Ok(ProviderCapabilities::from_json(&json))
    }

    async fn summarize(&self, request: &SummarizationRequest) -> Result<BackendReply> {
        let response = self
            .client
            .post(self.endpoint("summarize"))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();
        Ok(BackendReply::new(status, body))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let backend = HttpBackend::new("http://localhost:5050/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.endpoint("summarize"), "http://localhost:5050/summarize");
        assert_eq!(backend.base_url(), "http://localhost:5050");
    }

    #[test]
    fn success_range() {
        assert!(BackendReply::new(200, None).is_success());
        assert!(BackendReply::new(204, None).is_success());
        assert!(!BackendReply::new(500, None).is_success());
        assert!(!BackendReply::new(302, None).is_success());
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend =
            HttpBackend::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2)).unwrap();
        assert!(backend.fetch_providers().await.is_err());
    }
}
