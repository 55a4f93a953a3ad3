/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `serve`    — Run the inbound HTTP API
- `chat`     — Interactive terminal chat
- `sessions` — Non-interactive session management

These handlers are intentionally small and use the library components:
the reply proxy, the stores, and the orchestrator.
*/

pub mod chat;
pub mod serve;
pub mod sessions;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::SessionOrchestrator;
use crate::proxy::ReplyProxy;
use crate::store::{MemoryStore, MessageLedger, RestStore, SessionStore};
use std::sync::Arc;

/// Wire up an orchestrator from config
///
/// Chooses the remote REST store or the in-process store depending on
/// `store.ephemeral`.
pub fn build_orchestrator(config: &Config) -> Result<Arc<SessionOrchestrator>> {
    let engine = Arc::new(ReplyProxy::new(config.engine.clone())?);

    let (sessions, ledger): (Arc<dyn SessionStore>, Arc<dyn MessageLedger>) =
        if config.store.ephemeral {
            tracing::info!("Using in-process store; nothing will survive a restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        } else {
            let store = Arc::new(RestStore::new(config.store.clone())?);
            (store.clone(), store)
        };

    Ok(Arc::new(SessionOrchestrator::new(engine, sessions, ledger)))
}
