//! Storage abstraction for Summer.
//!
//! The [`KvStore`] trait is the storage collaborator behind summary history
//! and model history: a string-keyed store of whole JSON values. Every
//! `set` replaces the stored value in one write, so readers observe either
//! the previous value or the new one, never a mix.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | [`SqliteStore`](sqlite::SqliteStore) | `kv_store` table in the configured SQLite file |
//! | [`MemoryStore`](memory::MemoryStore) | `HashMap` behind a `RwLock` (tests, embedding) |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key under which the summary history is stored.
pub const SUMMARIES_KEY: &str = "summer_summaries";
/// Key under which the per-provider model history is stored.
pub const MODEL_HISTORY_KEY: &str = "model_history";

/// Abstract string-keyed JSON store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &Value) -> Result<()>;
}
