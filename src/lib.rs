//! FlowChat - conversation session orchestrator library
//!
//! This library provides the core functionality for FlowChat, a service
//! that lets users hold multi-turn conversations with an external AI
//! workflow engine while keeping every session and message durably
//! persisted and resumable.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `proxy`: Reply proxy to the workflow engine
//! - `store`: Session store and message ledger (remote REST and in-process)
//! - `orchestrator`: Session lifecycle, optimistic updates, reconciliation
//! - `server`: Inbound HTTP API
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use flowchat::{Config, SessionOrchestrator};
//! use flowchat::proxy::ReplyProxy;
//! use flowchat::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let orchestrator = SessionOrchestrator::new(
//!         Arc::new(ReplyProxy::new(config.engine.clone())?),
//!         store.clone(),
//!         store,
//!     );
//!
//!     let session = orchestrator.new_session("alice").await?;
//!     println!("created {}", session.id);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod proxy;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{FlowchatError, OrchestratorError, ProxyError, Result, StoreError};
pub use orchestrator::{SendOutcome, SessionOrchestrator, TurnState};
pub use store::{Message, Sender, Session};
