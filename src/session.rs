//! Typed access to the session store.
//!
//! The capture producer writes loosely-shaped JSON. This module is the
//! boundary where it becomes [`TabSession`] / [`QueueEntry`] values: each
//! collection is stored wrapped in an object under its own name
//! (`{"webhistory": {"webhistory": [...]}}`), and every element is
//! validated on read. Elements that do not parse are dropped with a warning
//! instead of failing the whole read.

use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::{QueueEntry, TabSession};
use crate::store::Store;

pub const WEBHISTORY: &str = "webhistory";
pub const URL_QUEUE: &str = "urlQueueList";
pub const TIME_QUEUE: &str = "timeQueueList";
pub const TOKEN: &str = "token";
pub const SEARCH_SPACE_ID: &str = "search_space_id";

/// Reads a wrapped collection. `None` when the key, or the inner list, is absent.
pub async fn load_collection<T: DeserializeOwned>(
    store: &dyn Store,
    key: &str,
) -> Result<Option<Vec<T>>> {
    let Some(outer) = store.get(key).await? else {
        return Ok(None);
    };
    let inner = match outer.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!(key, kind = json_kind(other), "stored collection is not a list; ignoring");
            return Ok(None);
        }
    };
    Ok(Some(parse_elements(key, inner)))
}

fn parse_elements<T: DeserializeOwned>(key: &str, items: &[Value]) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(key, index, error = %e, "dropping malformed stored record");
                None
            }
        })
        .collect()
}

/// Replaces a wrapped collection.
pub async fn save_collection<T: Serialize>(store: &dyn Store, key: &str, items: &[T]) -> Result<()> {
    let mut outer = Map::new();
    outer.insert(key.to_string(), serde_json::to_value(items)?);
    store.set(key, Value::Object(outer)).await
}

pub async fn load_webhistory(store: &dyn Store) -> Result<Option<Vec<TabSession>>> {
    load_collection(store, WEBHISTORY).await
}

pub async fn save_webhistory(store: &dyn Store, sessions: &[TabSession]) -> Result<()> {
    save_collection(store, WEBHISTORY, sessions).await
}

pub async fn load_queue(store: &dyn Store, key: &str) -> Result<Option<Vec<QueueEntry>>> {
    load_collection(store, key).await
}

pub async fn save_queue(store: &dyn Store, key: &str, entries: &[QueueEntry]) -> Result<()> {
    save_collection(store, key, entries).await
}

/// The stored API token, if set to a non-empty string.
pub async fn load_token(store: &dyn Store) -> Result<Option<String>> {
    Ok(match store.get(TOKEN).await? {
        Some(Value::String(t)) if !t.trim().is_empty() => Some(t),
        _ => None,
    })
}

pub async fn set_token(store: &dyn Store, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        bail!("token must not be empty");
    }
    store.set(TOKEN, json!(token)).await
}

pub async fn clear_token(store: &dyn Store) -> Result<()> {
    store.remove(TOKEN).await
}

/// The selected search space, if set to a non-zero integer.
pub async fn load_search_space_id(store: &dyn Store) -> Result<Option<i64>> {
    Ok(store.get(SEARCH_SPACE_ID).await?.as_ref().and_then(parse_search_space_id))
}

/// Parses a stored search-space id. Accepts a base-10 string or a JSON integer;
/// zero counts as "nothing selected".
pub fn parse_search_space_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    (id != 0).then_some(id)
}

pub async fn set_search_space_id(store: &dyn Store, id: i64) -> Result<()> {
    if id == 0 {
        bail!("search space id must be non-zero");
    }
    store.set(SEARCH_SPACE_ID, json!(id.to_string())).await
}

/// Loads a JSON object of `key -> value` into the store, key by key.
///
/// Returns the keys written, in the object's order.
pub async fn import_snapshot(store: &dyn Store, snapshot: Value) -> Result<Vec<String>> {
    let Value::Object(entries) = snapshot else {
        bail!("snapshot must be a JSON object of key -> value");
    };
    let mut written = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if matches!(key.as_str(), WEBHISTORY | URL_QUEUE | TIME_QUEUE) && value.get(&key).is_none() {
            bail!("'{}' must be wrapped as {{\"{}\": [...]}}", key, key);
        }
        store.set(&key, value).await?;
        written.push(key);
    }
    Ok(written)
}

/// Counts describing what the store currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub area: String,
    pub sessions: usize,
    pub pending_pages: usize,
    pub url_queue: usize,
    pub time_queue: usize,
    pub authenticated: bool,
    pub search_space_id: Option<i64>,
}

pub async fn summarize(store: &dyn Store) -> Result<StoreSummary> {
    let sessions = load_webhistory(store).await?.unwrap_or_default();
    Ok(StoreSummary {
        area: store.area().to_string(),
        sessions: sessions.len(),
        pending_pages: sessions.iter().map(|s| s.tab_history.len()).sum(),
        url_queue: load_queue(store, URL_QUEUE).await?.map_or(0, |q| q.len()),
        time_queue: load_queue(store, TIME_QUEUE).await?.map_or(0, |q| q.len()),
        authenticated: load_token(store).await?.is_some(),
        search_space_id: load_search_space_id(store).await?,
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
