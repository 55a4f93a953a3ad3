//! Shared test helpers: engine doubles and orchestrator wiring

#![allow(dead_code)]

use async_trait::async_trait;
use flowchat::error::ProxyError;
use flowchat::orchestrator::SessionOrchestrator;
use flowchat::proxy::ReplyEngine;
use flowchat::store::{MemoryStore, MessageLedger, SessionStore};
use std::sync::Arc;

/// Engine double that echoes the user message back
pub struct EchoEngine;

#[async_trait]
impl ReplyEngine for EchoEngine {
    async fn generate_reply(&self, message: &str, _session_id: &str) -> Result<String, ProxyError> {
        Ok(format!("echo: {}", message))
    }
}

/// Engine double that always fails with the given HTTP status
pub struct FailEngine(pub u16);

#[async_trait]
impl ReplyEngine for FailEngine {
    async fn generate_reply(
        &self,
        _message: &str,
        _session_id: &str,
    ) -> Result<String, ProxyError> {
        Err(ProxyError::UpstreamUnavailable { status: self.0 })
    }
}

/// Orchestrator over an in-process store and the given engine
pub fn memory_orchestrator(
    engine: Arc<dyn ReplyEngine>,
) -> (Arc<MemoryStore>, Arc<SessionOrchestrator>) {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(SessionOrchestrator::new(
        engine,
        store.clone() as Arc<dyn SessionStore>,
        store.clone() as Arc<dyn MessageLedger>,
    ));
    (store, orchestrator)
}
