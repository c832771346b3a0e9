//! Save dispatch: the entry point behind the "save" command.
//!
//! One [`Dispatcher::dispatch`] call reads the captured history, assembles
//! documents, drains the history, checks credentials, uploads the batch in a
//! single request and, once the backend accepted it, prunes closed tabs from
//! the store. Every step runs to completion before the next starts.
//!
//! # Drain order
//!
//! With [`DrainPolicy::Eager`] (the default) the drained history is written
//! back before the upload is attempted, so a failed upload loses those
//! pages from the store. [`DrainPolicy::OnSuccess`] defers that write until
//! the backend returned 2xx.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assemble::assemble;
use crate::backend::{Backend, BackendError};
use crate::config::{Config, DrainPolicy};
use crate::models::AuthContext;
use crate::reconcile::reconcile;
use crate::session;
use crate::store::Store;
use crate::tabs::TabOracle;

pub const SAVE_STARTED: &str = "Save Job Started";

/// Why a save did not go through. The `Display` text is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("No captured pages found. Please click 'Save Snapshot' first to capture the current page.")]
    NoCapturedData,

    #[error("No pages captured. Please click 'Save Snapshot' first to capture the current page, then try saving again.")]
    EmptyBatch,

    #[error("Not authenticated. Please enter your API key in extension settings.")]
    Unauthenticated,

    #[error("No search space selected. Please select a search space first.")]
    NoTargetSelected,

    #[error("Backend URL not configured. Please check extension configuration.")]
    MisconfiguredEndpoint,

    #[error("{0}")]
    RemoteRejected(String),

    #[error("Failed to save: {0}")]
    TransportFailure(String),

    #[error("Failed to save: {0}")]
    StoreFailure(String),
}

impl SyncError {
    fn store(e: anyhow::Error) -> Self {
        SyncError::StoreFailure(format!("{:#}", e))
    }
}

impl From<BackendError> for SyncError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Rejected(detail) => SyncError::RemoteRejected(detail),
            BackendError::Unauthorized => SyncError::RemoteRejected(e.to_string()),
            BackendError::Transport(inner) => SyncError::TransportFailure(inner.to_string()),
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub saved_count: usize,
}

/// Reply to an inbound save message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveResponse {
    Started { message: String },
    Failed { error: String },
}

impl SaveResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, SaveResponse::Started { .. })
    }
}

impl From<Result<SaveReport, SyncError>> for SaveResponse {
    fn from(result: Result<SaveReport, SyncError>) -> Self {
        match result {
            Ok(_) => SaveResponse::Started {
                message: SAVE_STARTED.to_string(),
            },
            Err(e) => SaveResponse::Failed {
                error: e.to_string(),
            },
        }
    }
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    tabs: Arc<dyn TabOracle>,
    backend: Option<Backend>,
    drain: DrainPolicy,
}

impl Dispatcher {
    /// `backend` is `None` when no base URL is configured; saves then fail
    /// with [`SyncError::MisconfiguredEndpoint`].
    pub fn new(store: Arc<dyn Store>, tabs: Arc<dyn TabOracle>, backend: Option<Backend>) -> Self {
        Self {
            store,
            tabs,
            backend,
            drain: DrainPolicy::default(),
        }
    }

    pub fn with_drain(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn Store>,
        tabs: Arc<dyn TabOracle>,
    ) -> anyhow::Result<Self> {
        let backend = match config.backend.resolve_url() {
            Some(url) => Some(Backend::new(&url, &config.backend)?),
            None => None,
        };
        Ok(Self::new(store, tabs, backend).with_drain(config.sync.drain))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn tabs(&self) -> &Arc<dyn TabOracle> {
        &self.tabs
    }

    pub async fn dispatch(&self) -> Result<SaveReport, SyncError> {
        let store = self.store.as_ref();

        let sessions = session::load_webhistory(store)
            .await
            .map_err(SyncError::store)?
            .ok_or(SyncError::NoCapturedData)?;

        let assembly = assemble(&sessions);
        tracing::debug!(
            sessions = sessions.len(),
            documents = assembly.documents.len(),
            "assembled captured history"
        );

        if self.drain == DrainPolicy::Eager {
            session::save_webhistory(store, &assembly.drained)
                .await
                .map_err(SyncError::store)?;
        }

        if assembly.is_empty() {
            return Err(SyncError::EmptyBatch);
        }

        let token = session::load_token(store)
            .await
            .map_err(SyncError::store)?
            .ok_or(SyncError::Unauthenticated)?;

        let search_space_id = session::load_search_space_id(store)
            .await
            .map_err(SyncError::store)?
            .ok_or(SyncError::NoTargetSelected)?;

        let auth = AuthContext {
            token,
            search_space_id,
        };

        let backend = self.backend.as_ref().ok_or(SyncError::MisconfiguredEndpoint)?;

        let reply = backend.upload_documents(&auth, &assembly.documents).await?;
        tracing::debug!(?reply, "backend accepted upload");

        if self.drain == DrainPolicy::OnSuccess {
            session::save_webhistory(store, &assembly.drained)
                .await
                .map_err(SyncError::store)?;
        }

        reconcile(store, self.tabs.as_ref()).await;

        let saved_count = assembly.documents.len();
        tracing::info!(saved_count, search_space_id = auth.search_space_id, "saved captured pages");
        Ok(SaveReport { saved_count })
    }
}

/// Inbound "save" message handler.
pub async fn handle_save(dispatcher: &Dispatcher) -> SaveResponse {
    let result = dispatcher.dispatch().await;
    if let Err(e) = &result {
        tracing::warn!(error = ?e, "save failed");
    }
    result.into()
}
