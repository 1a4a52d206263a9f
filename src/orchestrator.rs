//! Summarization workflow.
//!
//! One call to [`Orchestrator::summarize`] drives a single request through
//!
//! ```text
//! Idle → Extracting → Validating → Submitting → Succeeded
//!            │             │            │
//!            └─────────────┴────────────┴──────→ Failed
//! ```
//!
//! - **Extracting**: load the page and run [`crate::extract`]. Fewer than
//!   `min_chars` characters aborts with [`SummarizeError::ExtractionInsufficient`]
//!   before any network call.
//! - **Validating**: truncate to `max_chars` (appending `...`) and resolve
//!   the provider form against the cached capabilities.
//! - **Submitting**: `POST /summarize` while a [`ProgressTicker`] runs on
//!   its own task; the ticker is stopped the moment the request resolves.
//! - **Succeeded**: a non-empty summary was returned; it is prepended to the
//!   history and, for a custom model, the model is saved for suggestions.
//!
//! There are no retries. Every failure is terminal for the invocation and
//! the orchestrator is immediately ready for the next one. A second
//! invocation while one is in flight is rejected with [`SummarizeError::Busy`].

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::backend::{BackendReply, HttpBackend, SummarizeBackend};
use crate::config::{Config, SummarizeConfig};
use crate::extract;
use crate::history::{HistoryStore, ModelHistory};
use crate::models::{SummarizationRequest, SummaryRecord};
use crate::page::PageSource;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter, ProgressTicker};
use crate::providers::{self, CapabilityCache, ProviderCapabilities, ProviderForm};
use crate::store::{KvStore, SqliteStore};

/// Appended to text cut at `max_chars`.
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryState {
    Idle,
    Extracting,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl SummaryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryState::Idle => "idle",
            SummaryState::Extracting => "extracting",
            SummaryState::Validating => "validating",
            SummaryState::Submitting => "submitting",
            SummaryState::Succeeded => "succeeded",
            SummaryState::Failed => "failed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SummaryState::Idle => "ready",
            SummaryState::Extracting => "extracting page text...",
            SummaryState::Validating => "checking provider settings...",
            SummaryState::Submitting => "sending to backend...",
            SummaryState::Succeeded => "done",
            SummaryState::Failed => "failed",
        }
    }
}

/// Why a summarization did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarizeError {
    /// The page could not be loaded at all.
    PageUnavailable(String),
    ExtractionInsufficient { length: usize, min: usize },
    ValidationFailed { missing: Vec<String> },
    /// No reply from the backend (connection refused, DNS, timeout).
    TransportFailure { backend_url: String, detail: String },
    /// Non-2xx reply, or a 2xx reply carrying only an `error`.
    BackendRejected { status: u16, message: String },
    /// 2xx reply without usable summary content.
    EmptyResult,
    /// Another summarization is still running.
    Busy,
}

impl fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarizeError::PageUnavailable(e) => {
                write!(f, "Failed to access the page: {}", e)
            }
            SummarizeError::ExtractionInsufficient { length, min } => write!(
                f,
                "Could not extract meaningful content from this page ({} characters, need at least {}). \
                 Try a different page or check that the content has loaded.",
                length, min
            ),
            SummarizeError::ValidationFailed { missing } => {
                write!(f, "Please fill in: {}", missing.join(", "))
            }
            SummarizeError::TransportFailure {
                backend_url,
                detail,
            } => write!(
                f,
                "Failed to connect to backend. Make sure the server is running on {} ({})",
                backend_url, detail
            ),
            SummarizeError::BackendRejected { status, message } => {
                write!(f, "Backend error ({}): {}", status, message)
            }
            SummarizeError::EmptyResult => write!(f, "Received empty summary from backend."),
            SummarizeError::Busy => write!(f, "A summarization is already in progress."),
        }
    }
}

impl std::error::Error for SummarizeError {}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Turn a backend reply into summary text or the matching failure.
///
/// Non-string summaries are pretty-printed as JSON.
pub fn interpret_reply(reply: &BackendReply) -> Result<String, SummarizeError> {
    let error_message = reply
        .body
        .as_ref()
        .and_then(|b| b.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if !reply.is_success() {
        return Err(SummarizeError::BackendRejected {
            status: reply.status,
            message: error_message.unwrap_or_else(|| "Unknown backend error".to_string()),
        });
    }

    let summary = match reply.body.as_ref().and_then(|b| b.get("summary")) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => {
            return Err(match error_message {
                Some(message) => SummarizeError::BackendRejected {
                    status: reply.status,
                    message,
                },
                None => SummarizeError::EmptyResult,
            });
        }
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
    };

    if summary.trim().is_empty() {
        return Err(SummarizeError::EmptyResult);
    }
    Ok(summary)
}

/// Limits applied by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_chars: usize,
    pub max_chars: usize,
    pub progress_tick: Duration,
}

impl From<&SummarizeConfig> for Limits {
    fn from(c: &SummarizeConfig) -> Self {
        Self {
            min_chars: c.min_chars,
            max_chars: c.max_chars,
            progress_tick: Duration::from_millis(c.progress_tick_ms),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits::from(&SummarizeConfig::default())
    }
}

pub struct Orchestrator {
    backend: Arc<dyn SummarizeBackend>,
    history: HistoryStore,
    models: ModelHistory,
    capabilities: RwLock<CapabilityCache>,
    reporter: Arc<dyn ProgressReporter>,
    limits: Limits,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the invocation ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn SummarizeBackend>,
        store: Arc<dyn KvStore>,
        config: &SummarizeConfig,
    ) -> Self {
        Self {
            backend,
            history: HistoryStore::new(store.clone(), config.history_limit),
            models: ModelHistory::new(store, config.model_history_limit),
            capabilities: RwLock::new(CapabilityCache::default()),
            reporter: Arc::new(NoProgress),
            limits: Limits::from(config),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn models(&self) -> &ModelHistory {
        &self.models
    }

    /// Fetch capabilities from the backend into the cache. Never fails.
    pub async fn refresh_capabilities(&self) {
        let mut cache = self.capabilities.write().await;
        cache.refresh(&*self.backend).await;
    }

    pub async fn invalidate_capabilities(&self) {
        self.capabilities.write().await.invalidate();
    }

    pub async fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.read().await.capabilities()
    }

    /// Run one summarization end to end.
    pub async fn summarize(
        &self,
        page: &dyn PageSource,
        form: &ProviderForm,
    ) -> Result<SummaryRecord, SummarizeError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SummarizeError::Busy);
        }
        let _in_flight = InFlight(&self.in_flight);

        let result = self.run(page, form).await;
        match &result {
            Ok(_) => self.enter(SummaryState::Succeeded),
            Err(e) => {
                tracing::info!(error = %e, "summarization failed");
                self.enter(SummaryState::Failed);
            }
        }
        result
    }

    fn enter(&self, state: SummaryState) {
        tracing::debug!(state = state.as_str(), "orchestrator state");
        self.reporter.report(ProgressEvent::State(state));
    }

    async fn run(
        &self,
        page: &dyn PageSource,
        form: &ProviderForm,
    ) -> Result<SummaryRecord, SummarizeError> {
        self.enter(SummaryState::Extracting);
        let html = page
            .load_html()
            .await
            .map_err(|e| SummarizeError::PageUnavailable(format!("{:#}", e)))?;
        let extracted = extract::extract_html(&html);
        tracing::info!(
            page = %page.describe(),
            chars = extracted.len(),
            "extracted page text"
        );
        if extracted.len() < self.limits.min_chars {
            return Err(SummarizeError::ExtractionInsufficient {
                length: extracted.len(),
                min: self.limits.min_chars,
            });
        }

        self.enter(SummaryState::Validating);
        let text = truncate_text(extracted.content(), self.limits.max_chars);
        let caps = self.capabilities().await;
        let resolved = providers::resolve(&caps, form, text)
            .map_err(|missing| SummarizeError::ValidationFailed { missing })?;

        self.enter(SummaryState::Submitting);
        log_payload(&resolved.request);
        let ticker = ProgressTicker::start(self.reporter.clone(), self.limits.progress_tick);
        let reply = match self.backend.summarize(&resolved.request).await {
            Ok(reply) => {
                ticker.finish().await;
                reply
            }
            Err(e) => {
                ticker.cancel().await;
                return Err(SummarizeError::TransportFailure {
                    backend_url: self.backend.base_url().to_string(),
                    detail: format!("{:#}", e),
                });
            }
        };
        tracing::debug!(status = reply.status, "backend replied");

        let summary = interpret_reply(&reply)?;
        let record = SummaryRecord::new(summary, form.provider, &resolved.request.model);

        if let Err(e) = self.history.append(record.clone()).await {
            tracing::warn!(error = %e, "failed to save summary to history");
        }
        if let Some(model) = &resolved.custom_model {
            if let Err(e) = self.models.record(form.provider, model).await {
                tracing::warn!(error = %e, "failed to save model to history");
            }
        }

        Ok(record)
    }
}

fn log_payload(request: &SummarizationRequest) {
    let preview: String = request.text.chars().take(100).collect();
    tracing::info!(
        provider = %request.provider,
        model = request.model.as_str(),
        has_apikey = !request.apikey.is_empty(),
        has_instructions = !request.instructions.is_empty(),
        chars = request.text.chars().count(),
        "sending summarize request"
    );
    tracing::debug!(preview = preview.as_str(), "payload text preview");
}

/// `summer summarize`: run the workflow against the configured backend and
/// print the summary.
pub async fn run_summarize(
    config: &Config,
    page: &dyn PageSource,
    form: &ProviderForm,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<()> {
    let backend = Arc::new(HttpBackend::from_config(config)?);
    let store = Arc::new(SqliteStore::open(config).await?);
    let orchestrator =
        Orchestrator::new(backend, store, &config.summarize).with_reporter(reporter);

    orchestrator.refresh_capabilities().await;
    let record = orchestrator.summarize(page, form).await?;

    println!("Summary:");
    println!();
    println!("{}", record.summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use crate::page::StaticPage;
    use crate::providers::CUSTOM_MODEL;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    enum Canned {
        Reply(BackendReply),
        Gated(Arc<tokio::sync::Notify>, BackendReply),
        Unreachable,
    }

    struct FakeBackend {
        canned: Canned,
        caps: Value,
        seen: Mutex<Vec<SummarizationRequest>>,
    }

    impl FakeBackend {
        fn replying(status: u16, body: Value) -> Self {
            Self {
                canned: Canned::Reply(BackendReply::new(status, Some(body))),
                caps: json!({}),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                canned: Canned::Unreachable,
                caps: json!({}),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SummarizeBackend for FakeBackend {
        async fn fetch_providers(&self) -> Result<ProviderCapabilities> {
            Ok(ProviderCapabilities::from_json(&self.caps))
        }

        async fn summarize(&self, request: &SummarizationRequest) -> Result<BackendReply> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.canned {
                Canned::Reply(r) => Ok(r.clone()),
                Canned::Gated(gate, r) => {
                    gate.notified().await;
                    Ok(r.clone())
                }
                Canned::Unreachable => Err(anyhow::anyhow!("connection refused")),
            }
        }

        fn base_url(&self) -> &str {
            "http://backend.test"
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn article(text: &str) -> StaticPage {
        StaticPage::new(format!(
            "<html><body><nav>menu</nav><article>{}</article></body></html>",
            text
        ))
    }

    fn long_text() -> String {
        "The quick brown fox jumps over the lazy dog. ".repeat(10)
    }

    fn orchestrator(backend: Arc<FakeBackend>) -> Orchestrator {
        Orchestrator::new(
            backend,
            Arc::new(MemoryStore::new()),
            &SummarizeConfig::default(),
        )
    }

    fn ollama_form() -> ProviderForm {
        ProviderForm::new(Provider::Ollama, "llama3.2")
    }

    #[tokio::test]
    async fn success_records_history_and_reports_states() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": "Foxes jump."})));
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(backend.clone()).with_reporter(recorder.clone());

        let record = orch.summarize(&article(&long_text()), &ollama_form()).await.unwrap();
        assert_eq!(record.summary, "Foxes jump.");
        assert_eq!(record.provider, "ollama");
        assert_eq!(record.model, "llama3.2");

        let history = orch.history().list().await.unwrap();
        assert_eq!(history, vec![record]);

        let states: Vec<SummaryState> = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::State(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                SummaryState::Extracting,
                SummaryState::Validating,
                SummaryState::Submitting,
                SummaryState::Succeeded,
            ]
        );
        let events = recorder.0.lock().unwrap();
        assert!(events.contains(&ProgressEvent::Progress {
            percent: 100,
            label: "Complete!".to_string()
        }));
    }

    #[tokio::test]
    async fn long_text_is_truncated_with_marker() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": "ok"})));
        let orch = orchestrator(backend.clone());
        let text = "x".repeat(7000);

        orch.summarize(&article(&text), &ollama_form()).await.unwrap();

        let sent = backend.seen.lock().unwrap()[0].text.clone();
        assert_eq!(sent.chars().count(), 6000 + TRUNCATION_MARKER.len());
        assert!(sent.ends_with(TRUNCATION_MARKER));
        assert!(sent.starts_with(&"x".repeat(6000)));
    }

    #[tokio::test]
    async fn thin_page_fails_before_any_network_call() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": "ok"})));
        let orch = orchestrator(backend.clone());
        let page = StaticPage::new("<body><p>Too short.</p></body>");

        let err = orch.summarize(&page, &ollama_form()).await.unwrap_err();
        assert!(matches!(
            err,
            SummarizeError::ExtractionInsufficient { min: 50, .. }
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn minimum_length_is_inclusive() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": "ok"})));
        let orch = orchestrator(backend.clone());
        let page = |n: usize| StaticPage::new(format!("<body><div>{}</div></body>", "b".repeat(n)));

        let err = orch.summarize(&page(49), &ollama_form()).await.unwrap_err();
        assert_eq!(
            err,
            SummarizeError::ExtractionInsufficient { length: 49, min: 50 }
        );
        assert_eq!(backend.calls(), 0);

        orch.summarize(&page(50), &ollama_form()).await.unwrap();
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.seen.lock().unwrap()[0].text, "b".repeat(50));
    }

    #[tokio::test]
    async fn missing_fields_fail_validation_without_submitting() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": "ok"})));
        let orch = orchestrator(backend.clone());
        let form = ProviderForm::new(Provider::OpenAi, "gpt-4o-mini");

        let err = orch.summarize(&article(&long_text()), &form).await.unwrap_err();
        assert_eq!(
            err,
            SummarizeError::ValidationFailed {
                missing: vec!["API Key".to_string()]
            }
        );
        assert_eq!(err.to_string(), "Please fill in: API Key");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn capabilities_from_backend_satisfy_validation() {
        let mut fake = FakeBackend::replying(200, json!({"summary": "ok"}));
        fake.caps = json!({"openai": {"has_apikey": true}});
        let backend = Arc::new(fake);
        let orch = orchestrator(backend.clone());
        let form = ProviderForm::new(Provider::OpenAi, "gpt-4o-mini");

        orch.refresh_capabilities().await;
        orch.summarize(&article(&long_text()), &form).await.unwrap();
        assert_eq!(backend.seen.lock().unwrap()[0].apikey, "");

        orch.invalidate_capabilities().await;
        assert!(orch.summarize(&article(&long_text()), &form).await.is_err());
    }

    #[tokio::test]
    async fn rejected_reply_carries_backend_message() {
        let backend = Arc::new(FakeBackend::replying(500, json!({"error": "rate limited"})));
        let orch = orchestrator(backend);

        let err = orch
            .summarize(&article(&long_text()), &ollama_form())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert!(orch.history().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_summary_is_a_failure() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": ""})));
        let orch = orchestrator(backend);

        let err = orch
            .summarize(&article(&long_text()), &ollama_form())
            .await
            .unwrap_err();
        assert_eq!(err, SummarizeError::EmptyResult);
        assert!(orch.history().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_failure() {
        let backend = Arc::new(FakeBackend::unreachable());
        let orch = orchestrator(backend);

        let err = orch
            .summarize(&article(&long_text()), &ollama_form())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::TransportFailure { .. }));
        assert!(err.to_string().contains("http://backend.test"));

        // Ready again straight away.
        let err = orch
            .summarize(&article(&long_text()), &ollama_form())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::TransportFailure { .. }));
    }

    #[tokio::test]
    async fn custom_model_is_saved_only_on_success() {
        let backend = Arc::new(FakeBackend::replying(200, json!({"summary": "ok"})));
        let orch = orchestrator(backend);
        let mut form = ProviderForm::new(Provider::Ollama, CUSTOM_MODEL);
        form.custom_model = "qwen2.5:7b".to_string();

        orch.summarize(&article(&long_text()), &form).await.unwrap();
        assert_eq!(
            orch.models().list(Provider::Ollama).await.unwrap(),
            vec!["qwen2.5:7b"]
        );

        let failing = Arc::new(FakeBackend::replying(200, json!({"summary": ""})));
        let orch = orchestrator(failing);
        assert!(orch.summarize(&article(&long_text()), &form).await.is_err());
        assert!(orch.models().list(Provider::Ollama).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_invocation_is_busy() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let backend = Arc::new(FakeBackend {
            canned: Canned::Gated(
                gate.clone(),
                BackendReply::new(200, Some(json!({"summary": "ok"}))),
            ),
            caps: json!({}),
            seen: Mutex::new(Vec::new()),
        });
        let orch = Arc::new(orchestrator(backend.clone()));

        let first = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.summarize(&article(&long_text()), &ollama_form())
                    .await
            })
        };
        while backend.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let err = orch
            .summarize(&article(&long_text()), &ollama_form())
            .await
            .unwrap_err();
        assert_eq!(err, SummarizeError::Busy);

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(orch.history().list().await.unwrap().len(), 1);
    }

    #[test]
    fn interpret_reply_variants() {
        let ok = |body| interpret_reply(&BackendReply::new(200, Some(body)));
        assert_eq!(ok(json!({"summary": "s"})).unwrap(), "s");
        assert_eq!(
            ok(json!({"summary": {"points": [1]}})).unwrap(),
            "{\n  \"points\": [\n    1\n  ]\n}"
        );
        assert_eq!(ok(json!({"summary": "   "})), Err(SummarizeError::EmptyResult));
        assert_eq!(ok(json!({})), Err(SummarizeError::EmptyResult));
        assert_eq!(
            ok(json!({"error": "model not found"})),
            Err(SummarizeError::BackendRejected {
                status: 200,
                message: "model not found".to_string()
            })
        );
        assert_eq!(
            interpret_reply(&BackendReply::new(502, None)),
            Err(SummarizeError::BackendRejected {
                status: 502,
                message: "Unknown backend error".to_string()
            })
        );
        assert_eq!(
            interpret_reply(&BackendReply::new(200, None)),
            Err(SummarizeError::EmptyResult)
        );
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_text("héllo", 10), "héllo");
        assert_eq!(truncate_text("héllo", 5), "héllo");
        assert_eq!(truncate_text("héllo", 2), "hé...");
    }
}
