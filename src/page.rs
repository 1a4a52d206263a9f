//! Page sources: where the document to summarize comes from.
//!
//! A [`PageSource`] hands the orchestrator raw HTML; parsing and extraction
//! happen afterwards, synchronously, in [`crate::extract`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Summer/0.1";

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable location, for logs and errors.
    fn describe(&self) -> String;

    async fn load_html(&self) -> Result<String>;
}

/// A page fetched over HTTP(S).
pub struct UrlPage {
    url: url::Url,
    timeout: Duration,
}

impl UrlPage {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("Unsupported URL scheme '{}': use http or https", url.scheme());
        }
        Ok(Self { url, timeout })
    }
}

#[async_trait]
impl PageSource for UrlPage {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn load_html(&self) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .get(self.url.clone())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status, self.url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }
}

/// A page read from a local HTML file.
pub struct FilePage {
    path: PathBuf,
}

impl FilePage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FilePage {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load_html(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))
    }
}

/// A page held in memory.
pub struct StaticPage {
    html: String,
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[async_trait]
impl PageSource for StaticPage {
    fn describe(&self) -> String {
        "<static page>".to_string()
    }

    async fn load_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }
}

/// Build the page source for a CLI target: a file when `file` is given,
/// otherwise the URL.
pub fn page_for(
    url: Option<&str>,
    file: Option<PathBuf>,
    timeout: Duration,
) -> Result<Box<dyn PageSource>> {
    match (url, file) {
        (_, Some(path)) => Ok(Box::new(FilePage::new(path))),
        (Some(url), None) => Ok(Box::new(UrlPage::new(url, timeout)?)),
        (None, None) => bail!("Provide a URL or --file <PATH>"),
    }
}
