//! Storage abstraction for Tab Harvest.
//!
//! The [`Store`] trait is the single durable key/value area the pipeline
//! reads and writes: captured history, the URL and time queues, the API
//! token, and the selected search space. Values are arbitrary JSON; typed
//! access and validation live in [`crate::session`].
//!
//! A store instance is bound to one area (e.g. `"local"`). Each `set`
//! replaces a single key atomically; there is no cross-key transaction.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract area-scoped key/value storage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](Store::get) | Read one key, `None` when absent |
/// | [`set`](Store::set) | Replace one key's value |
/// | [`remove`](Store::remove) | Delete one key (no-op when absent) |
/// | [`keys`](Store::keys) | List keys present in the area |
#[async_trait]
pub trait Store: Send + Sync {
    /// Area this store is scoped to.
    fn area(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}
