//! Workflow engine reply proxy
//!
//! This module turns a user message plus a session identifier into AI reply
//! text by calling the external workflow engine over HTTP and extracting the
//! reply from its nested run-output structure. Persistence is deliberately
//! not handled here: a store failure after a successful call must not imply
//! the reply was lost.

use crate::config::EngineConfig;
use crate::error::ProxyError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anything that can produce an AI reply for a turn
///
/// The session identifier is forwarded on every call so the engine can use
/// prior turns belonging to that session as conversational context.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplyEngine: Send + Sync {
    /// Generate a reply for `message` within the conversation `session_id`
    async fn generate_reply(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<String, ProxyError>;
}

/// HTTP proxy to a Langflow-style workflow engine
///
/// Sends the fixed run payload (`input_value`, chat input/output types,
/// `session_id`, static `tweaks` map) and extracts the reply text from
/// `outputs[0].outputs[0].results.message.text`.
///
/// # Examples
///
/// ```no_run
/// use flowchat::config::EngineConfig;
/// use flowchat::proxy::{ReplyEngine, ReplyProxy};
///
/// # async fn example() -> anyhow::Result<()> {
/// let proxy = ReplyProxy::new(EngineConfig::default())?;
/// let reply = proxy.generate_reply("Hello!", "session-1").await?;
/// # Ok(())
/// # }
/// ```
pub struct ReplyProxy {
    client: Client,
    config: EngineConfig,
}

/// Request body for the engine's run endpoint
#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input_value: &'a str,
    output_type: &'a str,
    input_type: &'a str,
    session_id: &'a str,
    tweaks: &'a serde_json::Value,
}

/// Top-level run response from the engine
#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    outputs: Vec<RunOutput>,
}

/// Per-flow output entry
#[derive(Debug, Deserialize)]
struct RunOutput {
    #[serde(default)]
    outputs: Vec<ComponentOutput>,
}

/// Per-component output entry
#[derive(Debug, Deserialize)]
struct ComponentOutput {
    results: Option<ComponentResults>,
}

/// Results block of a chat-output component
#[derive(Debug, Deserialize)]
struct ComponentResults {
    message: Option<ResultMessage>,
}

/// The chat message produced by the flow
#[derive(Debug, Deserialize)]
struct ResultMessage {
    text: Option<String>,
}

impl ReplyProxy {
    /// Create a new proxy for the configured engine
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: EngineConfig) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Walk the nested run-output structure down to the reply text
    ///
    /// Each missing level names the field that was absent so the log tells
    /// operators which part of the flow misbehaved.
    fn extract_reply(response: RunResponse) -> Result<String, ProxyError> {
        let run = response
            .outputs
            .into_iter()
            .next()
            .ok_or_else(|| ProxyError::MalformedResponse("missing outputs[0]".to_string()))?;

        let component = run.outputs.into_iter().next().ok_or_else(|| {
            ProxyError::MalformedResponse("missing outputs[0].outputs[0]".to_string())
        })?;

        let results = component
            .results
            .ok_or_else(|| ProxyError::MalformedResponse("missing results".to_string()))?;

        let message = results
            .message
            .ok_or_else(|| ProxyError::MalformedResponse("missing results.message".to_string()))?;

        message
            .text
            .ok_or_else(|| ProxyError::MalformedResponse("missing message.text".to_string()))
    }
}

#[async_trait]
impl ReplyEngine for ReplyProxy {
    async fn generate_reply(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<String, ProxyError> {
        let body = RunRequest {
            input_value: message,
            output_type: "chat",
            input_type: "chat",
            session_id,
            tweaks: &self.config.tweaks,
        };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        // Connection failures and deadline expiry collapse to Timeout; the
        // caller only needs to know the reply was never obtained.
        let response = request.send().await.map_err(|e| {
            if !e.is_timeout() {
                tracing::debug!("Engine transport failure: {}", e);
            }
            ProxyError::Timeout
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Workflow engine returned failure");
            return Err(ProxyError::UpstreamUnavailable {
                status: status.as_u16(),
            });
        }

        let parsed: RunResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

        let text = Self::extract_reply(parsed)?;
        tracing::debug!(session_id, reply_chars = text.len(), "Engine reply extracted");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> RunResponse {
        serde_json::from_str(body).expect("valid JSON fixture")
    }

    #[test]
    fn test_extract_reply_from_nested_structure() {
        let body = r#"{
            "outputs": [{
                "outputs": [{
                    "results": {"message": {"text": "The answer is 42."}}
                }]
            }]
        }"#;
        let text = ReplyProxy::extract_reply(parse(body)).unwrap();
        assert_eq!(text, "The answer is 42.");
    }

    #[test]
    fn test_extract_reply_ignores_extra_fields() {
        let body = r#"{
            "session_id": "s-1",
            "outputs": [{
                "inputs": {"input_value": "hi"},
                "outputs": [{
                    "results": {"message": {"text": "hello", "sender": "Machine"}},
                    "artifacts": {}
                }]
            }]
        }"#;
        let text = ReplyProxy::extract_reply(parse(body)).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_missing_outputs_is_malformed() {
        let err = ReplyProxy::extract_reply(parse(r#"{"outputs": []}"#)).unwrap_err();
        assert!(matches!(err, ProxyError::MalformedResponse(_)));
        assert!(err.to_string().contains("outputs[0]"));
    }

    #[test]
    fn test_missing_inner_outputs_is_malformed() {
        let err =
            ReplyProxy::extract_reply(parse(r#"{"outputs": [{"outputs": []}]}"#)).unwrap_err();
        assert!(err.to_string().contains("outputs[0].outputs[0]"));
    }

    #[test]
    fn test_missing_results_is_malformed() {
        let body = r#"{"outputs": [{"outputs": [{}]}]}"#;
        let err = ReplyProxy::extract_reply(parse(body)).unwrap_err();
        assert!(err.to_string().contains("missing results"));
    }

    #[test]
    fn test_missing_message_text_is_malformed() {
        let body = r#"{"outputs": [{"outputs": [{"results": {"message": {}}}]}]}"#;
        let err = ReplyProxy::extract_reply(parse(body)).unwrap_err();
        assert!(err.to_string().contains("message.text"));
    }

    #[test]
    fn test_run_request_serialization() {
        let tweaks = serde_json::json!({"ChatInput-d8Jn1": {}});
        let request = RunRequest {
            input_value: "Hello",
            output_type: "chat",
            input_type: "chat",
            session_id: "s-1",
            tweaks: &tweaks,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["input_value"], "Hello");
        assert_eq!(value["output_type"], "chat");
        assert_eq!(value["input_type"], "chat");
        assert_eq!(value["session_id"], "s-1");
        assert!(value["tweaks"].get("ChatInput-d8Jn1").is_some());
    }
}
