//! Session and message persistence
//!
//! This module defines the data model for conversation sessions and their
//! messages, plus the `SessionStore` and `MessageLedger` traits the
//! orchestrator persists through. Two implementations are provided:
//!
//! - `RestStore`: a remote PostgREST-style HTTP store (the durable path)
//! - `MemoryStore`: an in-process store for tests and ephemeral runs

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default title for a freshly created session
///
/// Overwritten exactly once, by the session's first user message.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Default preview shown for a session with no messages yet
pub const DEFAULT_PREVIEW: &str = "Start a new conversation";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The human user
    User,
    /// The workflow engine
    Ai,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Ai => write!(f, "ai"),
        }
    }
}

/// A conversation session
///
/// Sessions are listed newest-first by `updated_at`. The `title` starts at
/// [`DEFAULT_TITLE`] and is overwritten once by the first user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque unique identifier, assigned by the store at creation
    pub id: String,
    /// Identity of the authenticated user; immutable after creation
    pub owner: String,
    /// Short human label for the session list
    pub title: String,
    /// Text of the most recent turn, for list rendering
    pub last_message_preview: String,
    /// Timestamp of the last mutation; drives descending list order
    pub updated_at: DateTime<Utc>,
}

/// A single turn within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier within the session
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// Who authored the message
    pub sender: Sender,
    /// Text body
    pub content: String,
    /// Creation time; ascending ordering key within a session
    pub timestamp: DateTime<Utc>,
    /// Insertion sequence, the tie-break for equal timestamps
    ///
    /// A user message always carries a lower `seq` than its paired AI
    /// reply, so replay order is stable even when both land in the same
    /// clock tick.
    #[serde(default)]
    pub seq: u64,
}

/// CRUD over session metadata
///
/// The store does not cascade deletes: the orchestrator must remove a
/// session's messages through the [`MessageLedger`] before calling
/// `delete`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// List sessions for `owner`, sorted by `updated_at` descending
    async fn list(&self, owner: &str) -> Result<Vec<Session>, StoreError>;

    /// Create a session with the default title and preview
    async fn create(&self, owner: &str) -> Result<Session, StoreError>;

    /// Fetch a single session by id
    async fn get(&self, session_id: &str) -> Result<Session, StoreError>;

    /// Set the session title; idempotent
    async fn rename(&self, session_id: &str, title: &str) -> Result<(), StoreError>;

    /// Update preview and timestamp without touching the title
    async fn touch(
        &self,
        session_id: &str,
        preview: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Remove the session record
    ///
    /// Callers must have removed the session's messages first.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

/// Append-only record of per-session turns
#[async_trait]
pub trait MessageLedger: Send + Sync {
    /// Append a turn to the session's record
    async fn append(
        &self,
        session_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Replay a session's messages, ascending by timestamp then `seq`
    ///
    /// This is the single source of truth on session selection; it
    /// overrides any client-held optimistic copy.
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Count messages in a session
    ///
    /// Drives the one-shot rename rule: a send whose pre-send count is
    /// zero derives the session title from its text.
    async fn count_by_session(&self, session_id: &str) -> Result<u64, StoreError>;

    /// Remove every message belonging to `session_id`
    ///
    /// Used only as the first phase of session deletion.
    async fn delete_by_session(&self, session_id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Sender::Ai).unwrap(), r#""ai""#);
    }

    #[test]
    fn test_sender_deserializes_lowercase() {
        let sender: Sender = serde_json::from_str(r#""ai""#).unwrap();
        assert_eq!(sender, Sender::Ai);
    }

    #[test]
    fn test_session_wire_field_names() {
        let session = Session {
            id: "s-1".to_string(),
            owner: "alice".to_string(),
            title: DEFAULT_TITLE.to_string(),
            last_message_preview: DEFAULT_PREVIEW.to_string(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("lastMessagePreview").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("last_message_preview").is_none());
    }

    #[test]
    fn test_message_wire_field_names() {
        let message = Message {
            id: "m-1".to_string(),
            session_id: "s-1".to_string(),
            sender: Sender::User,
            content: "hello".to_string(),
            timestamp: Utc::now(),
            seq: 3,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("sessionId").is_some());
        assert_eq!(value["sender"], "user");
    }

    #[test]
    fn test_message_seq_defaults_to_zero() {
        let json = r#"{
            "id": "m-1",
            "sessionId": "s-1",
            "sender": "ai",
            "content": "hi",
            "timestamp": "2026-08-25T12:00:00Z"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.seq, 0);
    }
}
