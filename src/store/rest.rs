//! Remote PostgREST-style store
//!
//! Talks to a hosted relational store exposing `sessions` and `messages`
//! collections over a REST API with filter and order query parameters.
//! Mutations use `Prefer: return=representation` so affected rows are
//! observable; a mutation that matches no rows maps to `NotFound`.
//!
//! The store does no optimistic versioning: `rename` and `touch` are
//! last-write-wins. HTTP 409 is still mapped to `Conflict` so a versioned
//! backend can slot in without changing callers.

use super::{Message, MessageLedger, Sender, Session, SessionStore, DEFAULT_PREVIEW, DEFAULT_TITLE};
use crate::config::StoreConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// HTTP client for the remote store
///
/// # Examples
///
/// ```no_run
/// use flowchat::config::StoreConfig;
/// use flowchat::store::{RestStore, SessionStore};
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = RestStore::new(StoreConfig::default())?;
/// let sessions = store.list("alice").await?;
/// # Ok(())
/// # }
/// ```
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Insert body for the `sessions` collection
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSessionRow<'a> {
    owner: &'a str,
    title: &'a str,
    last_message_preview: &'a str,
    updated_at: DateTime<Utc>,
}

/// Insert body for the `messages` collection
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMessageRow<'a> {
    session_id: &'a str,
    sender: Sender,
    content: &'a str,
    timestamp: DateTime<Utc>,
}

impl RestStore {
    /// Create a client for the configured store endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: StoreConfig) -> crate::error::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn collection(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Attach auth headers; the key doubles as `apikey` and bearer token
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    /// Map an HTTP response to the store error taxonomy
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "Store request failed: {}", detail);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
            StatusCode::NOT_FOUND => StoreError::NotFound(detail),
            StatusCode::CONFLICT => StoreError::Conflict(detail),
            _ => StoreError::Transport(format!("HTTP {}: {}", status.as_u16(), detail)),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Self::check(response).await
    }

    async fn json_rows<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<Vec<T>, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("invalid store response: {}", e)))
    }

    /// PATCH rows matching `id` and require at least one affected row
    async fn patch_session(
        &self,
        session_id: &str,
        body: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let request = self
            .authorize(self.client.patch(self.collection("sessions")))
            .query(&[("id", format!("eq.{}", session_id))])
            .header("Prefer", "return=representation")
            .json(body);

        let response = self.send(request).await?;
        let rows: Vec<Session> = Self::json_rows(response).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RestStore {
    async fn list(&self, owner: &str) -> Result<Vec<Session>, StoreError> {
        let request = self
            .authorize(self.client.get(self.collection("sessions")))
            .query(&[
                ("owner", format!("eq.{}", owner)),
                ("order", "updatedAt.desc".to_string()),
            ]);

        let response = self.send(request).await?;
        Self::json_rows(response).await
    }

    async fn create(&self, owner: &str) -> Result<Session, StoreError> {
        let row = NewSessionRow {
            owner,
            title: DEFAULT_TITLE,
            last_message_preview: DEFAULT_PREVIEW,
            updated_at: Utc::now(),
        };
        let request = self
            .authorize(self.client.post(self.collection("sessions")))
            .header("Prefer", "return=representation")
            .json(&row);

        let response = self.send(request).await?;
        let mut rows: Vec<Session> = Self::json_rows(response).await?;
        rows.pop()
            .ok_or_else(|| StoreError::Transport("insert returned no row".to_string()))
    }

    async fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        let request = self
            .authorize(self.client.get(self.collection("sessions")))
            .query(&[("id", format!("eq.{}", session_id))]);

        let response = self.send(request).await?;
        let mut rows: Vec<Session> = Self::json_rows(response).await?;
        rows.pop()
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))
    }

    async fn rename(&self, session_id: &str, title: &str) -> Result<(), StoreError> {
        self.patch_session(session_id, &serde_json::json!({ "title": title }))
            .await
    }

    async fn touch(
        &self,
        session_id: &str,
        preview: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.patch_session(
            session_id,
            &serde_json::json!({
                "lastMessagePreview": preview,
                "updatedAt": timestamp,
            }),
        )
        .await
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let request = self
            .authorize(self.client.delete(self.collection("sessions")))
            .query(&[("id", format!("eq.{}", session_id))])
            .header("Prefer", "return=representation");

        let response = self.send(request).await?;
        let rows: Vec<Session> = Self::json_rows(response).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageLedger for RestStore {
    async fn append(
        &self,
        session_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<Message, StoreError> {
        let row = NewMessageRow {
            session_id,
            sender,
            content,
            timestamp: Utc::now(),
        };
        let request = self
            .authorize(self.client.post(self.collection("messages")))
            .header("Prefer", "return=representation")
            .json(&row);

        let response = self.send(request).await?;
        let mut rows: Vec<Message> = Self::json_rows(response).await?;
        rows.pop()
            .ok_or_else(|| StoreError::Transport("insert returned no row".to_string()))
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let request = self
            .authorize(self.client.get(self.collection("messages")))
            .query(&[
                ("sessionId", format!("eq.{}", session_id)),
                ("order", "timestamp.asc,seq.asc".to_string()),
            ]);

        let response = self.send(request).await?;
        Self::json_rows(response).await
    }

    async fn count_by_session(&self, session_id: &str) -> Result<u64, StoreError> {
        let request = self
            .authorize(self.client.get(self.collection("messages")))
            .query(&[
                ("sessionId", format!("eq.{}", session_id)),
                ("select", "id".to_string()),
            ]);

        let response = self.send(request).await?;
        let rows: Vec<serde_json::Value> = Self::json_rows(response).await?;
        Ok(rows.len() as u64)
    }

    async fn delete_by_session(&self, session_id: &str) -> Result<(), StoreError> {
        let request = self
            .authorize(self.client.delete(self.collection("messages")))
            .query(&[("sessionId", format!("eq.{}", session_id))]);

        // Matching zero rows is fine here: a session with no messages yet
        // is still deletable.
        self.send(request).await.map(|_| ())
    }
}
