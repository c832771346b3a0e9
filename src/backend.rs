//! HTTP client for the document-ingestion backend.
//!
//! Two calls are used:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/api/v1/documents` | Upload a batch of captured documents |
//! | `GET`  | `/api/v1/searchspaces` | List the search spaces the token can write to |
//!
//! Both authenticate with `Authorization: Bearer <token>`. Neither call is
//! retried here; a failed upload is reported to the caller as is.

use std::time::Duration;

use anyhow::Result;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::models::{AuthContext, Document, SearchSpace};

pub const DOCUMENT_TYPE: &str = "EXTENSION";

/// Errors from a backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

/// Body of `POST /api/v1/documents`.
#[derive(Debug, Serialize)]
pub struct UploadRequest<'a> {
    pub document_type: &'static str,
    pub content: &'a [Document],
    pub search_space_id: i64,
}

#[derive(Debug, Clone)]
pub struct Backend {
    client: reqwest::Client,
    base_url: String,
}

impl Backend {
    /// Creates a client for `base_url` (no trailing slash).
    pub fn new(base_url: &str, config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one batch. Any 2xx counts as accepted; the response body is
    /// returned (or `Null` if it is not JSON) but not interpreted.
    pub async fn upload_documents(
        &self,
        auth: &AuthContext,
        documents: &[Document],
    ) -> Result<Value, BackendError> {
        let url = format!("{}/api/v1/documents", self.base_url);
        let body = UploadRequest {
            document_type: DOCUMENT_TYPE,
            content: documents,
            search_space_id: auth.search_space_id,
        };

        tracing::debug!(
            %url,
            documents = documents.len(),
            search_space_id = auth.search_space_id,
            "uploading documents"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", auth.token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = rejection_message(response, "Failed to save", Unparsed::HttpStatus).await;
            return Err(BackendError::Rejected(message));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| {
            tracing::warn!(%status, "backend accepted upload with a non-JSON body");
            Value::Null
        }))
    }

    /// Lists search spaces visible to `token`. HTTP 401 maps to
    /// [`BackendError::Unauthorized`].
    pub async fn list_search_spaces(&self, token: &str) -> Result<Vec<SearchSpace>, BackendError> {
        let url = format!("{}/api/v1/searchspaces", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
            s if s.is_success() => Ok(response.json().await?),
            _ => Err(BackendError::Rejected(
                rejection_message(response, "Failed to fetch search spaces", Unparsed::Prefixed)
                    .await,
            )),
        }
    }
}

/// What a rejection reads as when its body is not JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unparsed {
    /// `"HTTP {code}: {reason}"`
    HttpStatus,
    /// The same `"{prefix}: {status}"` line as a JSON body without `detail`.
    Prefixed,
}

/// Message for a non-2xx response: the JSON `detail` when present, a
/// `"{prefix}: {status}"` line when the body is JSON without one, and the
/// `unparsed` form when the body is not JSON at all.
async fn rejection_message(response: Response, prefix: &str, unparsed: Unparsed) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let fallback = format!("{}: {}", prefix, status);
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => match json.get("detail") {
            Some(Value::String(d)) if !d.is_empty() => d.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => fallback,
            Some(d) => d.to_string(),
        },
        Err(_) => match unparsed {
            Unparsed::HttpStatus => format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ),
            Unparsed::Prefixed => fallback,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    #[test]
    fn test_upload_request_shape() {
        let docs = vec![Document {
            metadata: DocumentMetadata {
                browsing_session_id: "1".into(),
                visited_web_page_url: "https://a".into(),
                visited_web_page_title: "A".into(),
                visited_web_page_date_with_time_in_iso_string: "".into(),
                visited_web_page_refferer_url: "".into(),
                visited_web_page_visit_duration_in_milliseconds: "0".into(),
            },
            page_content: "text".into(),
        }];
        let body = serde_json::to_value(UploadRequest {
            document_type: DOCUMENT_TYPE,
            content: &docs,
            search_space_id: 42,
        })
        .unwrap();

        assert_eq!(body["document_type"], "EXTENSION");
        assert_eq!(body["search_space_id"], 42);
        assert_eq!(body["content"][0]["pageContent"], "text");
        assert_eq!(body["content"][0]["metadata"]["VisitedWebPageURL"], "https://a");
    }

    #[test]
    fn test_base_url_trimmed() {
        let b = Backend::new("http://localhost:8000/", &BackendConfig::default()).unwrap();
        assert_eq!(b.base_url(), "http://localhost:8000");
    }
}
