//! # Tab Harvest
//!
//! Per-tab browsing history capture store, reconciliation, and document
//! sync for a browser extension backend.
//!
//! An upstream capture process records page visits per tab into a
//! key/value [session store](store). On a save request the
//! [dispatcher](dispatch) turns every recorded visit into a normalized
//! [`Document`](models::Document), drains the history, uploads the batch to
//! the backend in one request and then [reconciles](reconcile) the store
//! against the tabs that are still open.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │ Session Store│──▶│ Assemble │──▶│  Dispatch  │──▶│ Backend  │
//! │ (SQLite/mem) │   │  + drain │   │ auth/target│   │ POST docs│
//! └──────▲───────┘   └──────────┘   └─────┬──────┘   └──────────┘
//!        │                                │ on success
//!        │           ┌──────────┐         ▼
//!        └───────────│Reconcile │◀── Tab oracle (open tabs)
//!                    └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Key/value store trait, in-memory and SQLite backends |
//! | [`session`] | Typed, validated access to the stored collections |
//! | [`tabs`] | Open-tab sources |
//! | [`assemble`] | Page visits → documents |
//! | [`reconcile`] | Pruning of closed tabs |
//! | [`backend`] | Backend HTTP client |
//! | [`spaces`] | Search-space listing |
//! | [`dispatch`] | The save entry point |
//! | [`server`] | HTTP host adapter |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod assemble;
pub mod backend;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod migrate;
pub mod models;
pub mod reconcile;
pub mod server;
pub mod session;
pub mod spaces;
pub mod store;
pub mod tabs;
