//! Error types for FlowChat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling. The taxonomy keeps
//! workflow-engine failures, store failures, and orchestration failures
//! distinct so callers can decide what to retry.

use thiserror::Error;

/// Errors raised while proxying a turn to the workflow engine
///
/// These are independent from persistence failures: a caller that holds a
/// `ProxyError` knows the reply was never obtained, while a store failure
/// after a successful proxy call means the reply exists but was not saved.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The engine call did not complete within the configured deadline
    #[error("Workflow engine call timed out")]
    Timeout,

    /// The engine answered with a non-success status
    #[error("Workflow engine unavailable: HTTP {status}")]
    UpstreamUnavailable {
        /// HTTP status code returned by the engine
        status: u16,
    },

    /// The engine answered 2xx but the reply text could not be extracted
    #[error("Malformed workflow engine response: {0}")]
    MalformedResponse(String),
}

/// Errors raised by the session store and message ledger
#[derive(Error, Debug)]
pub enum StoreError {
    /// The resolved identity does not own the target session
    #[error("Unauthorized: owner does not match session")]
    Unauthorized,

    /// The target session or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent mutation was detected by the store
    #[error("Conflict: concurrent mutation detected for {0}")]
    Conflict(String),

    /// The store could not be reached or answered with an unexpected status
    #[error("Store transport error: {0}")]
    Transport(String),
}

/// Errors raised by the session orchestrator itself
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A second send was issued while a turn for the same session was in flight
    #[error("A turn is already in flight for session {0}")]
    Busy(String),

    /// Message deletion failed, so the session row was left in place
    #[error("Partial delete for session {session_id}: {reason}")]
    PartialDelete {
        /// The session whose messages could not be fully removed
        session_id: String,
        /// Why the message deletion failed
        reason: String,
    },
}

/// Main error type for FlowChat operations
///
/// Wraps the component taxonomies plus the ambient failures (IO, config,
/// serialization) that any command can hit.
#[derive(Error, Debug)]
pub enum FlowchatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected caller input (empty message, malformed id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Workflow engine proxy errors
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Session store / message ledger errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Orchestration errors
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for FlowChat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
