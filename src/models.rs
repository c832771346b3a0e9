//! Core data models used throughout Tab Harvest.
//!
//! These types describe the records kept in the session store (tab sessions,
//! page visits, queue entries) and the normalized documents that are sent to
//! the backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a browser tab session.
///
/// The capture producer writes either the numeric tab id or a string id.
/// Comparison is strict on that form: `1` and `"1"` are different tabs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabId {
    Num(i64),
    Text(String),
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabId::Num(n) => write!(f, "{}", n),
            TabId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TabId {
    fn from(n: i64) -> Self {
        TabId::Num(n)
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        TabId::Text(s.to_string())
    }
}

/// One tab's identity and the page visits captured for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSession {
    #[serde(rename = "tabsessionId")]
    pub tabsession_id: TabId,
    #[serde(rename = "tabHistory", default, deserialize_with = "lenient_history")]
    pub tab_history: Vec<PageVisit>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TabSession {
    pub fn new(tabsession_id: impl Into<TabId>, tab_history: Vec<PageVisit>) -> Self {
        Self {
            tabsession_id: tabsession_id.into(),
            tab_history,
            extra: Map::new(),
        }
    }

    /// Same session with its history replaced by an empty sequence.
    pub fn drained(&self) -> Self {
        Self {
            tabsession_id: self.tabsession_id.clone(),
            tab_history: Vec::new(),
            extra: self.extra.clone(),
        }
    }
}

/// Decodes `tabHistory` visit by visit. A visit that does not decode is
/// dropped on its own; a missing, null or non-list history reads as empty.
fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<PageVisit>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let visits = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Vec::new()),
        Value::Array(visits) => visits,
        _ => {
            tracing::warn!("tabHistory is not a list; reading it as empty");
            return Ok(Vec::new());
        }
    };
    Ok(visits
        .into_iter()
        .enumerate()
        .filter_map(|(index, visit)| match serde_json::from_value(visit) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(index, error = %e, "dropping malformed page visit");
                None
            }
        })
        .collect())
}

/// A raw page visit as written by the capture producer.
///
/// Only the fields below are interpreted; everything else is carried in
/// `extra`. Values may be any JSON scalar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(rename = "entryTime", default, skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<Value>,
    #[serde(
        rename = "reffererUrl",
        alias = "referrerUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub referrer_url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(
        rename = "pageContentMarkdown",
        alias = "pageContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub page_content: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Auxiliary per-tab record in the URL and time queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(rename = "tabsessionId")]
    pub tabsession_id: TabId,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Metadata block of a [`Document`]. Every field is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentMetadata {
    pub browsing_session_id: String,
    #[serde(rename = "VisitedWebPageURL")]
    pub visited_web_page_url: String,
    pub visited_web_page_title: String,
    #[serde(rename = "VisitedWebPageDateWithTimeInISOString")]
    pub visited_web_page_date_with_time_in_iso_string: String,
    #[serde(rename = "VisitedWebPageReffererURL")]
    pub visited_web_page_refferer_url: String,
    pub visited_web_page_visit_duration_in_milliseconds: String,
}

/// Normalized unit of content sent to the backend, one per visited page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub metadata: DocumentMetadata,
    #[serde(rename = "pageContent")]
    pub page_content: String,
}

/// Credentials and target read from the store at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub token: String,
    pub search_space_id: i64,
}

/// A search space as returned by `GET /api/v1/searchspaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
