//! In-memory [`Store`] implementation for tests and embedding hosts.
//!
//! Uses a `BTreeMap` behind a `tokio::sync::RwLock`, so `keys()` comes back
//! sorted and no lock is held across an `.await` of the caller.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::Store;

/// In-memory store scoped to a single area.
pub struct InMemoryStore {
    area: String,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_area("local")
    }

    pub fn with_area(area: &str) -> Self {
        Self {
            area: area.to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seed the store from a JSON object of `key -> value`.
    pub fn from_object(object: serde_json::Map<String, Value>) -> Self {
        Self {
            area: "local".to_string(),
            entries: RwLock::new(object.into_iter().collect()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn area(&self) -> &str {
        &self.area
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
