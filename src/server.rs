//! Inbound HTTP API
//!
//! Exposes the orchestrator over HTTP for browser-style clients:
//!
//! - `POST /api/chat` — proxy a turn; mints a session when `sessionId`
//!   is absent
//! - `GET /api/sessions` — list the caller's sessions, newest first
//! - `POST /api/sessions` — create a session
//! - `GET /api/sessions/{id}/messages` — replay a session
//! - `DELETE /api/sessions/{id}` — cascading delete
//!
//! Identity is resolved from the `x-user-id` header (the store's identity
//! primitive is assumed upstream of this service); a missing header is a
//! 401, never a crash. At this boundary engine failures collapse to a
//! single user-visible error; the finer taxonomy is logged only.

use crate::error::{FlowchatError, OrchestratorError, StoreError};
use crate::orchestrator::SessionOrchestrator;
use crate::store::{Message, Session};
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{async_trait, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the resolved owner identity
const OWNER_HEADER: &str = "x-user-id";

/// Shared state for all routes
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<SessionOrchestrator>,
}

/// Request body for `POST /api/chat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message
    pub message: String,
    /// Target session; a new session is minted when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Success body for `POST /api/chat`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// The AI reply text
    pub message: String,
    /// The session the turn belongs to
    pub session_id: String,
}

/// Error body shared by every route
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure description
    pub error: String,
}

/// Resolved owner identity, extracted from [`OWNER_HEADER`]
pub struct Owner(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match owner {
            Some(owner) => Ok(Owner(owner.to_string())),
            None => Err(error_response(
                StatusCode::UNAUTHORIZED,
                "Missing user identity",
            )),
        }
    }
}

/// Build the API router
pub fn router(orchestrator: Arc<SessionOrchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", axum::routing::delete(delete_session))
        .route("/api/sessions/:id/messages", get(list_messages))
        .with_state(AppState { orchestrator })
}

/// Bind and serve the API until the process is stopped
pub async fn serve(orchestrator: Arc<SessionOrchestrator>, addr: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Map internal failures to user-visible responses
fn map_error(error: FlowchatError) -> Response {
    tracing::warn!("Request failed: {}", error);
    match &error {
        // Engine distinctions are for logs only; the client sees one error.
        FlowchatError::Proxy(_) => {
            error_response(StatusCode::BAD_GATEWAY, "Failed to generate a reply")
        }
        FlowchatError::Store(StoreError::Unauthorized) => {
            error_response(StatusCode::UNAUTHORIZED, "Not authorized for this session")
        }
        FlowchatError::Store(StoreError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "Session not found")
        }
        FlowchatError::Store(StoreError::Conflict(_)) => {
            error_response(StatusCode::CONFLICT, "Concurrent modification")
        }
        FlowchatError::Orchestrator(OrchestratorError::Busy(_)) => error_response(
            StatusCode::CONFLICT,
            "A turn is already in flight for this session",
        ),
        FlowchatError::InvalidInput(reason) => error_response(StatusCode::BAD_REQUEST, reason),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    }
}

/// Require that `session_id` exists and belongs to `owner`
async fn authorize_session(
    state: &AppState,
    owner: &str,
    session_id: &str,
) -> Result<(), Response> {
    let session = state
        .orchestrator
        .get_session(session_id)
        .await
        .map_err(map_error)?;

    if session.owner != owner {
        return Err(map_error(StoreError::Unauthorized.into()));
    }
    Ok(())
}

async fn chat(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, Response> {
    if let Some(session_id) = request.session_id.as_deref() {
        authorize_session(&state, &owner, session_id).await?;
    }

    let outcome = state
        .orchestrator
        .handle_turn(&owner, &request.message, request.session_id.as_deref())
        .await
        .map_err(map_error)?;

    if let Some(failure) = &outcome.persist_error {
        // The reply is still returned; only durability suffered.
        tracing::warn!(session_id = %outcome.session_id, "Reply not fully persisted: {}", failure);
    }

    Ok(Json(ChatResponse {
        message: outcome.reply,
        session_id: outcome.session_id,
    }))
}

async fn list_sessions(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<Session>>, Response> {
    let sessions = state
        .orchestrator
        .list_sessions(&owner)
        .await
        .map_err(map_error)?;
    Ok(Json(sessions))
}

async fn create_session(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<(StatusCode, Json<Session>), Response> {
    let session = state
        .orchestrator
        .create_session(&owner)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_messages(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Message>>, Response> {
    authorize_session(&state, &owner, &session_id).await?;

    let messages = state
        .orchestrator
        .replay_session(&session_id)
        .await
        .map_err(map_error)?;
    Ok(Json(messages))
}

async fn delete_session(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
) -> Result<StatusCode, Response> {
    authorize_session(&state, &owner, &session_id).await?;

    state
        .orchestrator
        .delete_session(&session_id)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}
