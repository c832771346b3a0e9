//! Store reconciliation against the open tabs.
//!
//! Drops every stored session and queue entry whose tab is no longer open.
//! Reconciliation is a best-effort cleanup: [`reconcile`] logs failures and
//! returns normally so it can run after a save without affecting its result.

use std::collections::HashSet;

use anyhow::Result;
use serde::Serialize;

use crate::models::TabId;
use crate::session::{self, TIME_QUEUE, URL_QUEUE};
use crate::store::Store;
use crate::tabs::{live_ids, TabOracle};

/// Kept/removed counts for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pruned {
    pub kept: usize,
    pub removed: usize,
}

/// What a reconciliation pass did. `skipped` means there was no history yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub skipped: bool,
    pub live_tabs: usize,
    pub sessions: Pruned,
    pub url_queue: Pruned,
    pub time_queue: Pruned,
}

/// Runs [`try_reconcile`] and swallows any error after logging it.
pub async fn reconcile(store: &dyn Store, oracle: &dyn TabOracle) {
    match try_reconcile(store, oracle).await {
        Ok(report) if report.skipped => {}
        Ok(report) => tracing::debug!(?report, "reconciled session store"),
        Err(e) => tracing::warn!(error = %e, "reconciliation failed; store left as is"),
    }
}

pub async fn try_reconcile(store: &dyn Store, oracle: &dyn TabOracle) -> Result<ReconcileReport> {
    let history = session::load_webhistory(store).await?.unwrap_or_default();
    if history.is_empty() {
        return Ok(ReconcileReport {
            skipped: true,
            ..Default::default()
        });
    }
    let url_queue = session::load_queue(store, URL_QUEUE).await?.unwrap_or_default();
    let time_queue = session::load_queue(store, TIME_QUEUE).await?.unwrap_or_default();

    let live = live_ids(&oracle.open_tabs().await?);

    let (history, sessions) = retain_live(history, &live, |s| &s.tabsession_id);
    let (url_queue, url_pruned) = retain_live(url_queue, &live, |e| &e.tabsession_id);
    let (time_queue, time_pruned) = retain_live(time_queue, &live, |e| &e.tabsession_id);

    session::save_webhistory(store, &history).await?;
    session::save_queue(store, URL_QUEUE, &url_queue).await?;
    session::save_queue(store, TIME_QUEUE, &time_queue).await?;

    Ok(ReconcileReport {
        skipped: false,
        live_tabs: live.len(),
        sessions,
        url_queue: url_pruned,
        time_queue: time_pruned,
    })
}

/// Keeps entries whose tab is live, in their original relative order.
fn retain_live<T>(
    entries: Vec<T>,
    live: &HashSet<TabId>,
    tab_of: impl Fn(&T) -> &TabId,
) -> (Vec<T>, Pruned) {
    let before = entries.len();
    let kept: Vec<T> = entries
        .into_iter()
        .filter(|e| live.contains(tab_of(e)))
        .collect();
    let pruned = Pruned {
        kept: kept.len(),
        removed: before - kept.len(),
    };
    (kept, pruned)
}
