//! Search-space listing for target selection.

use crate::backend::{Backend, BackendError};
use crate::models::SearchSpace;
use crate::session;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpacesError {
    #[error("Not authenticated. Please enter your API key first.")]
    NotAuthenticated,

    #[error("Token rejected by the backend; it has been removed. Please log in again.")]
    Unauthorized,

    #[error("{0}")]
    Backend(String),

    #[error("Failed to access store: {0}")]
    Store(String),
}

/// Lists the search spaces the stored token can access.
///
/// A 401 from the backend means the stored token is stale; it is removed
/// from the store before [`SpacesError::Unauthorized`] is returned.
pub async fn list_search_spaces(
    store: &dyn Store,
    backend: &Backend,
) -> Result<Vec<SearchSpace>, SpacesError> {
    let token = session::load_token(store)
        .await
        .map_err(|e| SpacesError::Store(format!("{:#}", e)))?
        .ok_or(SpacesError::NotAuthenticated)?;

    match backend.list_search_spaces(&token).await {
        Ok(spaces) => Ok(spaces),
        Err(BackendError::Unauthorized) => {
            tracing::warn!("backend rejected stored token; clearing it");
            session::clear_token(store)
                .await
                .map_err(|e| SpacesError::Store(format!("{:#}", e)))?;
            Err(SpacesError::Unauthorized)
        }
        Err(e) => Err(SpacesError::Backend(e.to_string())),
    }
}
