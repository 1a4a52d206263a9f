//! Summarization progress reporting.
//!
//! Reports state transitions and a *simulated* progress estimate while a
//! summarize request is in flight. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.
//!
//! The estimate is cosmetic: it starts at 10%, climbs 8 points per tick up
//! to 85%, and jumps to 100% when the reply arrives. It runs on its own
//! tokio task ([`ProgressTicker`]) and knows nothing about the request; the
//! orchestrator stops it as soon as the request resolves.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::orchestrator::SummaryState;

pub const START_PERCENT: u8 = 10;
pub const STEP_PERCENT: u8 = 8;
pub const CEILING_PERCENT: u8 = 85;
pub const DONE_PERCENT: u8 = 100;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The orchestrator entered a new state.
    State(SummaryState),
    /// Simulated progress while submitting.
    Progress { percent: u8, label: String },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "summer  [#####---------------]  28%  Processing...".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::State(state) => format!("summer  {}\n", state.label()),
            ProgressEvent::Progress { percent, label } => {
                format!("summer  {}  {:>3}%  {}\n", bar(*percent), percent, label)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::State(state) => serde_json::json!({
                "event": "state",
                "state": state.as_str(),
            }),
            ProgressEvent::Progress { percent, label } => serde_json::json!({
                "event": "progress",
                "percent": percent,
                "label": label,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize) / 5;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(20 - filled))
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}

/// The simulated percentage, independent of any real work.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgressEstimate {
    percent: u8,
}

impl ProgressEstimate {
    pub fn new() -> Self {
        Self {
            percent: START_PERCENT,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// One tick: +8 points, never past the ceiling.
    pub fn advance(&mut self) -> u8 {
        self.percent = self.percent.saturating_add(STEP_PERCENT).min(CEILING_PERCENT);
        self.percent
    }
}

impl Default for ProgressEstimate {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a [`ProgressEstimate`] on a fixed cadence until stopped.
///
/// Dropping the ticker stops it as well.
pub struct ProgressTicker {
    reporter: Arc<dyn ProgressReporter>,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Report the starting estimate and begin ticking every `tick`.
    pub fn start(reporter: Arc<dyn ProgressReporter>, tick: Duration) -> Self {
        let mut estimate = ProgressEstimate::new();
        reporter.report(ProgressEvent::Progress {
            percent: estimate.percent(),
            label: "Connecting...".to_string(),
        });

        let task_reporter = reporter.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let percent = estimate.advance();
                task_reporter.report(ProgressEvent::Progress {
                    percent,
                    label: "Processing...".to_string(),
                });
            }
        });

        Self { reporter, handle }
    }

    /// Stop ticking and report 100%.
    ///
    /// Waits for the ticker task to wind down first, so no tick can land
    /// after the final report.
    pub async fn finish(mut self) {
        self.stop().await;
        self.reporter.report(ProgressEvent::Progress {
            percent: DONE_PERCENT,
            label: "Complete!".to_string(),
        });
    }

    /// Stop ticking without a final report.
    pub async fn cancel(mut self) {
        self.stop().await;
    }

    async fn stop(&mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
