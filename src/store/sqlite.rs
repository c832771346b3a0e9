//! SQLite-backed [`Store`] implementation.
//!
//! Every key is one row of `kv_store(area, key, value, updated_at)`, with
//! the value kept as JSON text. The table is created by
//! [`crate::migrate::run_migrations`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use super::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    area: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, area: &str) -> Self {
        Self {
            pool,
            area: area.to_string(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn area(&self) -> &str {
        &self.area
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE area = ? AND key = ?")
                .bind(&self.area)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|text| {
            serde_json::from_str(&text)
                .with_context(|| format!("Corrupt JSON stored under '{}/{}'", self.area, key))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let text = serde_json::to_string(&value)?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (area, key, value, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(area, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.area)
        .bind(key)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE area = ? AND key = ?")
            .bind(&self.area)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM kv_store WHERE area = ? ORDER BY key")
                .bind(&self.area)
                .fetch_all(&self.pool)
                .await?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::create_schema;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let store = SqliteStore::new(memory_pool().await, "local");
        assert_eq!(store.get("webhistory").await.unwrap(), None);

        let v = json!({ "webhistory": [{ "tabsessionId": 1, "tabHistory": [] }] });
        store.set("webhistory", v.clone()).await.unwrap();
        assert_eq!(store.get("webhistory").await.unwrap(), Some(v));

        store.set("webhistory", json!({ "webhistory": [] })).await.unwrap();
        assert_eq!(
            store.get("webhistory").await.unwrap(),
            Some(json!({ "webhistory": [] }))
        );
    }

    #[tokio::test]
    async fn test_areas_are_isolated() {
        let pool = memory_pool().await;
        let local = SqliteStore::new(pool.clone(), "local");
        let sync = SqliteStore::new(pool, "sync");

        local.set("token", json!("a")).await.unwrap();
        assert_eq!(sync.get("token").await.unwrap(), None);
        assert_eq!(local.keys().await.unwrap(), vec!["token"]);
        assert!(sync.keys().await.unwrap().is_empty());

        local.remove("token").await.unwrap();
        assert_eq!(local.get("token").await.unwrap(), None);
    }
}
