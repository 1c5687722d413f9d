//! HTTP service for lendlog.
//!
//! Every read endpoint replays the ledger on demand; the only state held
//! in memory is the catalog, which changes only on an explicit reload.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AdminGate, HistoryAccess};
pub use config::{ServerConfig, WebhookConfig};
pub use error::{ServerError, ServerResult};
pub use hooks::{NoOpHook, TransactionHook, TransactionNotice, WebhookHook};
pub use server::LendlogServer;
pub use state::{AppState, Ledger, SharedState};
