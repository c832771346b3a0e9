//! Tab liveness sources.
//!
//! The reconciler needs to know which tabs the browser still has open. A
//! [`TabOracle`] answers "list all open tabs"; tabs without an id (devtools
//! windows, prerender tabs) may appear in the answer and are ignored by
//! [`live_ids`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::models::TabId;

/// One open tab as reported by the host browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTab {
    #[serde(default)]
    pub id: Option<TabId>,
}

impl OpenTab {
    pub fn new(id: impl Into<TabId>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }
}

/// Source of the currently open tabs. Read-only from the pipeline's side.
#[async_trait]
pub trait TabOracle: Send + Sync {
    async fn open_tabs(&self) -> Result<Vec<OpenTab>>;
}

/// Set of ids among `tabs` that carry one.
pub fn live_ids(tabs: &[OpenTab]) -> HashSet<TabId> {
    tabs.iter().filter_map(|t| t.id.clone()).collect()
}

/// In-process tab list, replaced wholesale by the host.
///
/// A default instance has no list yet and answers with an error, so a
/// reconciliation run before the host reported its tabs prunes nothing.
#[derive(Default)]
pub struct StaticTabs {
    tabs: RwLock<Option<Vec<OpenTab>>>,
}

impl StaticTabs {
    pub fn new(tabs: Vec<OpenTab>) -> Self {
        Self {
            tabs: RwLock::new(Some(tabs)),
        }
    }

    pub async fn replace(&self, tabs: Vec<OpenTab>) {
        *self.tabs.write().await = Some(tabs);
    }
}

#[async_trait]
impl TabOracle for StaticTabs {
    async fn open_tabs(&self) -> Result<Vec<OpenTab>> {
        self.tabs
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no open-tab list has been reported yet"))
    }
}

/// Tab list kept in a JSON file (`[{"id": 1}, ...]`) by a native host.
pub struct TabsFile {
    path: PathBuf,
}

impl TabsFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl TabOracle for TabsFile {
    async fn open_tabs(&self) -> Result<Vec<OpenTab>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read tab list: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid tab list in {}", self.path.display()))
    }
}

/// Tab source for a config: the `[tabs] file` when set, otherwise an
/// unset [`StaticTabs`].
pub fn from_config(config: &Config) -> Arc<dyn TabOracle> {
    match &config.tabs.file {
        Some(path) => Arc::new(TabsFile::new(path)),
        None => Arc::new(StaticTabs::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_ids_skips_missing() {
        let tabs: Vec<OpenTab> =
            serde_json::from_str(r#"[{"id": 1}, {}, {"id": null}, {"id": "t2"}, {"id": 1}]"#)
                .unwrap();
        let ids = live_ids(&tabs);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&TabId::Num(1)));
        assert!(ids.contains(&TabId::from("t2")));
    }

    #[tokio::test]
    async fn test_static_tabs_replace() {
        let tabs = StaticTabs::new(vec![OpenTab::new(1)]);
        assert_eq!(tabs.open_tabs().await.unwrap().len(), 1);
        tabs.replace(vec![]).await;
        assert!(tabs.open_tabs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unset_static_tabs_errors() {
        let tabs = StaticTabs::default();
        assert!(tabs.open_tabs().await.is_err());
        tabs.replace(vec![OpenTab::new(2)]).await;
        assert_eq!(tabs.open_tabs().await.unwrap(), vec![OpenTab::new(2)]);
    }

    #[tokio::test]
    async fn test_tabs_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tabs.json");

        let oracle = TabsFile::new(&path);
        assert!(oracle.open_tabs().await.is_err());

        std::fs::write(&path, r#"[{"id": 3}, {"id": 4, "title": "ignored"}]"#).unwrap();
        let tabs = oracle.open_tabs().await.unwrap();
        assert_eq!(tabs, vec![OpenTab::new(3), OpenTab::new(4)]);

        std::fs::write(&path, "not json").unwrap();
        assert!(oracle.open_tabs().await.is_err());
    }
}
