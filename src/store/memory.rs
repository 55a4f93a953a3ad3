//! In-process session store and message ledger
//!
//! Backs `--ephemeral` runs and the test suite. Nothing survives a
//! restart. Ordering semantics match the remote store: sessions list
//! newest-first, messages replay ascending with an insertion-sequence
//! tie-break.

use super::{Message, MessageLedger, Sender, Session, SessionStore, DEFAULT_PREVIEW, DEFAULT_TITLE};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use ulid::Ulid;
use uuid::Uuid;

/// In-memory store implementing both persistence traits
///
/// # Examples
///
/// ```
/// use flowchat::store::{MemoryStore, SessionStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let session = store.create("alice").await.unwrap();
/// assert_eq!(session.title, "New Chat");
/// # });
/// ```
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    seq: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn list(&self, owner: &str) -> Result<Vec<Session>, StoreError> {
        let sessions = self.sessions.lock().expect("sessions lock poisoned");
        let mut owned: Vec<Session> = sessions
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    async fn create(&self, owner: &str) -> Result<Session, StoreError> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            title: DEFAULT_TITLE.to_string(),
            last_message_preview: DEFAULT_PREVIEW.to_string(),
            updated_at: Utc::now(),
        };
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        let sessions = self.sessions.lock().expect("sessions lock poisoned");
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))
    }

    async fn rename(&self, session_id: &str, title: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;
        session.title = title.to_string();
        Ok(())
    }

    async fn touch(
        &self,
        session_id: &str,
        preview: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;
        session.last_message_preview = preview.to_string();
        session.updated_at = timestamp;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))
    }
}

#[async_trait]
impl MessageLedger for MemoryStore {
    async fn append(
        &self,
        session_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<Message, StoreError> {
        let message = Message {
            id: Ulid::new().to_string(),
            session_id: session_id.to_string(),
            sender,
            content: content.to_string(),
            timestamp: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        };
        let mut messages = self.messages.lock().expect("messages lock poisoned");
        messages
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().expect("messages lock poisoned");
        let mut replay = messages.get(session_id).cloned().unwrap_or_default();
        replay.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.seq.cmp(&b.seq)));
        Ok(replay)
    }

    async fn count_by_session(&self, session_id: &str) -> Result<u64, StoreError> {
        let messages = self.messages.lock().expect("messages lock poisoned");
        Ok(messages.get(session_id).map_or(0, |m| m.len() as u64))
    }

    async fn delete_by_session(&self, session_id: &str) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().expect("messages lock poisoned");
        messages.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_uses_defaults() {
        let store = MemoryStore::new();
        let session = store.create("alice").await.unwrap();
        assert_eq!(session.title, DEFAULT_TITLE);
        assert_eq!(session.last_message_preview, DEFAULT_PREVIEW);
        assert_eq!(session.owner, "alice");
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryStore::new();
        let a = store.create("alice").await.unwrap();
        let b = store.create("alice").await.unwrap();

        let now = Utc::now();
        store
            .touch(&a.id, "older", now - chrono::Duration::minutes(5))
            .await
            .unwrap();
        store.touch(&b.id, "newer", now).await.unwrap();

        let listed = store.list("alice").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let store = MemoryStore::new();
        store.create("alice").await.unwrap();
        store.create("bob").await.unwrap();

        let listed = store.list("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner, "alice");
    }

    #[tokio::test]
    async fn test_rename_does_not_touch_preview() {
        let store = MemoryStore::new();
        let session = store.create("alice").await.unwrap();
        store.rename(&session.id, "Rust questions").await.unwrap();

        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.title, "Rust questions");
        assert_eq!(fetched.last_message_preview, DEFAULT_PREVIEW);
    }

    #[tokio::test]
    async fn test_rename_missing_session_is_not_found() {
        let store = MemoryStore::new();
        let err = store.rename("nope", "title").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_touch_does_not_alter_title() {
        let store = MemoryStore::new();
        let session = store.create("alice").await.unwrap();
        store.touch(&session.id, "latest reply", Utc::now()).await.unwrap();

        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.title, DEFAULT_TITLE);
        assert_eq!(fetched.last_message_preview, "latest reply");
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_seq() {
        let store = MemoryStore::new();
        let user = store.append("s-1", Sender::User, "hi").await.unwrap();
        let ai = store.append("s-1", Sender::Ai, "hello").await.unwrap();
        assert!(user.seq < ai.seq);
    }

    #[tokio::test]
    async fn test_replay_orders_user_before_paired_ai() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append("s-1", Sender::User, &format!("q{}", i))
                .await
                .unwrap();
            store
                .append("s-1", Sender::Ai, &format!("a{}", i))
                .await
                .unwrap();
        }

        let replay = store.list_by_session("s-1").await.unwrap();
        assert_eq!(replay.len(), 10);
        for pair in replay.chunks(2) {
            assert_eq!(pair[0].sender, Sender::User);
            assert_eq!(pair[1].sender, Sender::Ai);
        }
        // Non-decreasing timestamps throughout.
        for window in replay.windows(2) {
            assert!(window[0].timestamp <= window[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_count_by_session() {
        let store = MemoryStore::new();
        assert_eq!(store.count_by_session("s-1").await.unwrap(), 0);
        store.append("s-1", Sender::User, "hi").await.unwrap();
        assert_eq!(store.count_by_session("s-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_session_leaves_others_alone() {
        let store = MemoryStore::new();
        store.append("s-1", Sender::User, "hi").await.unwrap();
        store.append("s-2", Sender::User, "yo").await.unwrap();

        store.delete_by_session("s-1").await.unwrap();
        assert!(store.list_by_session("s-1").await.unwrap().is_empty());
        assert_eq!(store.list_by_session("s-2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_session_is_not_found() {
        let store = MemoryStore::new();
        let err = SessionStore::delete(&store, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
