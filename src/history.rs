//! Bounded summary history and per-provider model suggestions.
//!
//! Both live in a [`KvStore`] as whole JSON values:
//!
//! | Key | Shape | Cap |
//! |-----|-------|-----|
//! | `summer_summaries` | `[SummaryRecord]`, most recent first | `history_limit` (10) |
//! | `model_history` | `{provider: [model]}`, most recently used first | `model_history_limit` (5) per provider |
//!
//! Every mutation is a read-modify-write of the whole value, serialized by
//! an async mutex so overlapping callers in one process cannot lose writes.
//! Stored values that fail to decode are treated as empty.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::{Provider, SummaryRecord};
use crate::store::{KvStore, SqliteStore, MODEL_HISTORY_KEY, SUMMARIES_KEY};

pub struct HistoryStore {
    store: Arc<dyn KvStore>,
    limit: usize,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KvStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Prepend `record` and drop the oldest entries beyond the cap.
    pub async fn append(&self, record: SummaryRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<SummaryRecord> = read_or_default(&*self.store, SUMMARIES_KEY).await?;
        push_front_capped(&mut records, record, self.limit);
        self.store
            .set(SUMMARIES_KEY, &serde_json::to_value(&records)?)
            .await
    }

    /// All stored records, most recent first.
    pub async fn list(&self) -> Result<Vec<SummaryRecord>> {
        read_or_default(&*self.store, SUMMARIES_KEY).await
    }

    /// Replace the history with an empty sequence in a single write.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.set(SUMMARIES_KEY, &Value::Array(Vec::new())).await
    }
}

/// Recently used custom model names, per provider.
pub struct ModelHistory {
    store: Arc<dyn KvStore>,
    limit: usize,
    write_lock: Mutex<()>,
}

impl ModelHistory {
    pub fn new(store: Arc<dyn KvStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Move `model` to the front of the provider's list. Blank names are ignored.
    pub async fn record(&self, provider: Provider, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut all: BTreeMap<String, Vec<String>> =
            read_or_default(&*self.store, MODEL_HISTORY_KEY).await?;
        let models = all.entry(provider.as_str().to_string()).or_default();
        push_distinct_front(models, model, self.limit);
        self.store
            .set(MODEL_HISTORY_KEY, &serde_json::to_value(&all)?)
            .await?;
        tracing::debug!(provider = %provider, model, "saved model to history");
        Ok(())
    }

    pub async fn list(&self, provider: Provider) -> Result<Vec<String>> {
        let mut all = self.all().await?;
        Ok(all.remove(provider.as_str()).unwrap_or_default())
    }

    pub async fn all(&self) -> Result<BTreeMap<String, Vec<String>>> {
        read_or_default(&*self.store, MODEL_HISTORY_KEY).await
    }
}

async fn read_or_default<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &str) -> Result<T> {
    let Some(value) = store.get(key).await? else {
        return Ok(T::default());
    };
    match serde_json::from_value(value) {
        Ok(v) => Ok(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring undecodable stored value");
            Ok(T::default())
        }
    }
}

fn push_front_capped<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.insert(0, item);
    items.truncate(cap);
}

fn push_distinct_front(items: &mut Vec<String>, item: &str, cap: usize) {
    items.retain(|m| m != item);
    push_front_capped(items, item.to_string(), cap);
}

// ============ CLI entry points ============

/// `summer history list`: print stored summaries, most recent first.
pub async fn run_history_list(config: &Config, json: bool) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let history = HistoryStore::new(store, config.summarize.history_limit);
    let records = history.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No summaries yet!");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        let provider = display_or_unknown(&record.provider);
        let model = display_or_unknown(&record.model);
        println!(
            "[{}] {}  {} - {}",
            i + 1,
            format_timestamp(record.timestamp),
            provider.to_uppercase(),
            model
        );
        println!("{}", record.summary);
        println!();
    }

    Ok(())
}

/// `summer history clear`
pub async fn run_history_clear(config: &Config) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    HistoryStore::new(store, config.summarize.history_limit)
        .clear()
        .await?;
    println!("History cleared!");
    Ok(())
}

/// `summer models [provider]`: print model suggestions.
pub async fn run_models(config: &Config, provider: Option<Provider>) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let models = ModelHistory::new(store, config.summarize.model_history_limit);

    let providers: Vec<Provider> = match provider {
        Some(p) => vec![p],
        None => Provider::ALL.to_vec(),
    };

    for p in providers {
        let names = models.list(p).await?;
        if names.is_empty() {
            println!("{:<10} (none)", p);
        } else {
            println!("{:<10} {}", p, names.join(", "));
        }
    }
    Ok(())
}

fn display_or_unknown(s: &str) -> &str {
    if s.trim().is_empty() || s == "unknown" {
        "Unknown"
    } else {
        s
    }
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%b %-d, %Y, %I:%M %p")
                .to_string()
        })
        .unwrap_or_else(|| ms.to_string())
}
