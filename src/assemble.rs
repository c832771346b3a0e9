//! Document assembly.
//!
//! Turns the page visits accumulated per tab into a flat batch of
//! [`Document`]s (one per visit) and the drained session list that replaces
//! the stored history once the batch has been built.

use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

use crate::models::{Document, DocumentMetadata, PageVisit, TabId, TabSession};

pub const DEFAULT_TITLE: &str = "No Title";
pub const DEFAULT_DURATION: &str = "0";

/// Output of [`assemble`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    /// One document per page visit, in session then visit order.
    pub documents: Vec<Document>,
    /// One record per input session, same order, every history empty.
    pub drained: Vec<TabSession>,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub fn assemble(sessions: &[TabSession]) -> Assembly {
    let mut assembly = Assembly {
        documents: Vec::with_capacity(sessions.iter().map(|s| s.tab_history.len()).sum()),
        drained: Vec::with_capacity(sessions.len()),
    };

    for session in sessions {
        if !session.tab_history.is_empty() {
            let before = assembly.documents.len();
            assembly.documents.extend(
                session
                    .tab_history
                    .iter()
                    .map(|visit| visit_to_document(&session.tabsession_id, visit)),
            );
            tracing::debug!(
                tab = %session.tabsession_id,
                documents = assembly.documents.len() - before,
                "assembled tab history"
            );
        }
        assembly.drained.push(session.drained());
    }

    assembly
}

/// Normalizes one visit. Missing fields fall back to `""`, except the
/// title (`"No Title"`) and the duration (`"0"`).
pub fn visit_to_document(tab: &TabId, visit: &PageVisit) -> Document {
    let field = |v: &Option<Value>, default: &str| {
        v.as_ref()
            .and_then(scalar_text)
            .unwrap_or_else(|| default.to_string())
    };

    Document {
        metadata: DocumentMetadata {
            browsing_session_id: tab.to_string(),
            visited_web_page_url: field(&visit.url, ""),
            visited_web_page_title: field(&visit.title, DEFAULT_TITLE),
            visited_web_page_date_with_time_in_iso_string: visit
                .entry_time
                .as_ref()
                .and_then(entry_time_text)
                .unwrap_or_default(),
            visited_web_page_refferer_url: field(&visit.referrer_url, ""),
            visited_web_page_visit_duration_in_milliseconds: field(
                &visit.duration,
                DEFAULT_DURATION,
            ),
        },
        page_content: field(&visit.page_content, ""),
    }
}

/// String form of a present value; `None` for the values the capture
/// producer treats as unset (`null`, `""`, `false`, `0`).
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        other => Some(other.to_string()),
    }
}

/// Entry times arrive either as a preformatted string or as epoch
/// milliseconds; the latter is rendered as an ISO 8601 UTC timestamp.
fn entry_time_text(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if ms == 0 {
                return None;
            }
            DateTime::from_timestamp_millis(ms)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
                .or_else(|| Some(ms.to_string()))
        }
        other => scalar_text(other),
    }
}
