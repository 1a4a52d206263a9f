//! In-memory [`KvStore`] implementation for testing and library embedding.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::KvStore;

/// In-memory store; values are lost when dropped.
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_replaces_whole_value() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());
        store.set("k", &json!([1, 2, 3])).await.unwrap();
        store.set("k", &json!([])).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!([])));
    }
}
