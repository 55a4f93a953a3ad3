//! Conversation session orchestration
//!
//! The `SessionOrchestrator` is the façade the presentation layer talks to.
//! It coordinates the reply proxy, the session store, and the message
//! ledger, and owns the consistency rules:
//!
//! - optimistic update: the user message appears in the in-view sequence
//!   immediately, before any network call settles
//! - reconciliation: selecting a session wholesale-replaces the in-view
//!   sequence with the ledger replay (server truth wins)
//! - reply-then-persist: a successfully generated reply is never discarded
//!   because a later persistence call failed
//! - one-shot rename: the session title is derived from the first user
//!   message, guarded by a pre-send ledger count of zero
//! - two-phase delete: messages are removed before the session record, and
//!   a ledger failure aborts the delete instead of orphaning messages

use crate::error::{FlowchatError, OrchestratorError, ProxyError, StoreError};
use crate::proxy::ReplyEngine;
use crate::store::{Message, MessageLedger, Sender, Session, SessionStore};
use chrono::Utc;
use metrics::increment_counter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Maximum length of a title derived from the first user message
const TITLE_MAX_CHARS: usize = 40;

/// Turn state of the session currently in view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No turn in flight; the view reflects the last replay or append
    Idle,
    /// A user message was submitted and the engine call has not settled
    Sending,
    /// The last engine call failed; the optimistic user message remains
    Failed,
}

/// Result of a completed send
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Session the turn belongs to (freshly minted if none was active)
    pub session_id: String,
    /// The AI reply text
    pub reply: String,
    /// New title, when this send renamed the session
    pub title: Option<String>,
    /// Description of a persistence failure, if any
    ///
    /// The reply above is still valid; it was generated before persistence
    /// was attempted.
    pub persist_error: Option<String>,
}

/// In-view conversation state
struct View {
    active_session: Option<String>,
    messages: Vec<Message>,
    turn: TurnState,
    /// Bumped on every session switch/create so a turn that was in flight
    /// when the user navigated away cannot mutate the new view.
    generation: u64,
}

impl View {
    fn new() -> Self {
        Self {
            active_session: None,
            messages: Vec::new(),
            turn: TurnState::Idle,
            generation: 0,
        }
    }

    fn reset_to(&mut self, session_id: Option<String>, messages: Vec<Message>) {
        self.active_session = session_id;
        self.messages = messages;
        self.turn = TurnState::Idle;
        self.generation += 1;
    }
}

/// Coordinates the reply proxy, session store, and message ledger
pub struct SessionOrchestrator {
    engine: Arc<dyn ReplyEngine>,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn MessageLedger>,
    view: Mutex<View>,
    /// Session ids with a turn in flight; a second send is rejected Busy
    in_flight: Mutex<HashSet<String>>,
    /// Local id counter for optimistic messages not yet persisted
    local_seq: AtomicU64,
}

/// Removes a session id from the in-flight set when the turn settles,
/// including on early return
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&self.session_id);
    }
}

/// Derive a session title from its first user message
///
/// Truncates to 40 characters on a char boundary. Pure function of the
/// message text so the rename decision cannot race a list refresh.
///
/// # Examples
///
/// ```
/// use flowchat::orchestrator::derive_title;
///
/// assert_eq!(derive_title("Hello"), "Hello");
/// assert_eq!(derive_title(&"x".repeat(50)).chars().count(), 40);
/// ```
pub fn derive_title(message: &str) -> String {
    message.trim().chars().take(TITLE_MAX_CHARS).collect()
}

impl SessionOrchestrator {
    /// Create an orchestrator over the given collaborators
    pub fn new(
        engine: Arc<dyn ReplyEngine>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn MessageLedger>,
    ) -> Self {
        Self {
            engine,
            sessions,
            ledger,
            view: Mutex::new(View::new()),
            in_flight: Mutex::new(HashSet::new()),
            local_seq: AtomicU64::new(0),
        }
    }

    fn view(&self) -> MutexGuard<'_, View> {
        self.view.lock().expect("view lock poisoned")
    }

    /// Session id currently in view, if any
    pub fn active_session(&self) -> Option<String> {
        self.view().active_session.clone()
    }

    /// Snapshot of the in-view message sequence
    pub fn messages_in_view(&self) -> Vec<Message> {
        self.view().messages.clone()
    }

    /// Turn state of the session in view
    pub fn turn_state(&self) -> TurnState {
        self.view().turn
    }

    /// List the owner's sessions, newest first
    ///
    /// Safe to call while a turn is in flight; listing has no ordering
    /// dependency on an active send.
    pub async fn list_sessions(&self, owner: &str) -> Result<Vec<Session>, FlowchatError> {
        Ok(self.sessions.list(owner).await?)
    }

    /// Create a session without adopting it into the view
    ///
    /// Used by the stateless HTTP front end; interactive callers want
    /// [`new_session`](Self::new_session) instead.
    pub async fn create_session(&self, owner: &str) -> Result<Session, FlowchatError> {
        let session = self.sessions.create(owner).await?;
        tracing::info!(session_id = %session.id, owner, "Created session");
        Ok(session)
    }

    /// Fetch a single session's metadata
    pub async fn get_session(&self, session_id: &str) -> Result<Session, FlowchatError> {
        Ok(self.sessions.get(session_id).await?)
    }

    /// Replay a session's messages without touching the view
    pub async fn replay_session(&self, session_id: &str) -> Result<Vec<Message>, FlowchatError> {
        Ok(self.ledger.list_by_session(session_id).await?)
    }

    /// Create a session and make it the active view (cleared to empty)
    pub async fn new_session(&self, owner: &str) -> Result<Session, FlowchatError> {
        let session = self.create_session(owner).await?;
        self.view().reset_to(Some(session.id.clone()), Vec::new());
        Ok(session)
    }

    /// Select a session, replaying its messages from the ledger
    ///
    /// The session row must exist before its id is adopted; otherwise later
    /// sends would persist messages under an id no session owns. The replay
    /// wholesale-replaces any optimistic in-view state, and the generation
    /// bump marks any still-in-flight turn's view updates as discardable.
    pub async fn select_session(&self, session_id: &str) -> Result<Vec<Message>, FlowchatError> {
        let session = self.sessions.get(session_id).await?;
        let replay = self.ledger.list_by_session(&session.id).await?;
        tracing::debug!(session_id, count = replay.len(), "Replayed session");

        self.view().reset_to(Some(session.id), replay.clone());
        Ok(replay)
    }

    /// Send a user message in the active session
    ///
    /// Creates a session first when none is active. Rejects with
    /// [`OrchestratorError::Busy`] when a turn for the session is already
    /// in flight. On engine failure the view moves to `Failed` and the
    /// optimistic user message stays visible; no AI message is appended.
    /// Persistence failures are reported in the outcome, never as an `Err`.
    pub async fn send(&self, owner: &str, text: &str) -> Result<SendOutcome, FlowchatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowchatError::InvalidInput("empty message".to_string()));
        }

        let session_id = match self.active_session() {
            Some(id) => id,
            None => self.new_session(owner).await?.id,
        };

        let _guard = self.claim_flight(&session_id)?;
        let pre_count = self.pre_send_count(&session_id).await;

        // Optimistic append: the user sees their message immediately.
        let generation = {
            let mut view = self.view();
            let message = self.local_message(&session_id, Sender::User, text);
            view.messages.push(message);
            view.turn = TurnState::Sending;
            view.generation
        };

        increment_counter!("flowchat_turns_total");
        let reply = match self.engine.generate_reply(text, &session_id).await {
            Ok(reply) => reply,
            Err(e) => {
                increment_counter!("flowchat_turn_failures_total");
                tracing::warn!(session_id = %session_id, "Engine call failed: {}", e);
                let mut view = self.view();
                if view.generation == generation {
                    view.turn = TurnState::Failed;
                }
                return Err(e.into());
            }
        };

        {
            let mut view = self.view();
            if view.generation == generation {
                let message = self.local_message(&session_id, Sender::Ai, &reply);
                view.messages.push(message);
            } else {
                // The user navigated away mid-flight; the reply still gets
                // persisted to its session, but the new view is untouched.
                tracing::debug!(session_id = %session_id, "Stale turn; view not updated");
            }
        }

        let (title, persist_error) = self
            .persist_turn(&session_id, text, &reply, pre_count)
            .await;

        // Reconciled regardless of persistence outcome (UI-first policy).
        let mut view = self.view();
        if view.generation == generation {
            view.turn = TurnState::Idle;
        }

        Ok(SendOutcome {
            session_id,
            reply,
            title,
            persist_error,
        })
    }

    /// Stateless turn for the inbound HTTP endpoint
    ///
    /// Mints a session when `session_id` is absent, then runs the same
    /// persisted-turn pipeline as [`send`](Self::send) without touching the
    /// in-view state.
    pub async fn handle_turn(
        &self,
        owner: &str,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<SendOutcome, FlowchatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowchatError::InvalidInput("empty message".to_string()));
        }

        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create(owner).await?.id,
        };

        let _guard = self.claim_flight(&session_id)?;
        let pre_count = self.pre_send_count(&session_id).await;

        increment_counter!("flowchat_turns_total");
        let reply = self
            .engine
            .generate_reply(text, &session_id)
            .await
            .map_err(|e| {
                increment_counter!("flowchat_turn_failures_total");
                tracing::warn!(session_id = %session_id, "Engine call failed: {}", e);
                FlowchatError::from(e)
            })?;

        let (title, persist_error) = self
            .persist_turn(&session_id, text, &reply, pre_count)
            .await;

        Ok(SendOutcome {
            session_id,
            reply,
            title,
            persist_error,
        })
    }

    /// Delete a session and all of its messages, messages first
    ///
    /// If message deletion fails the session record is left untouched and
    /// [`OrchestratorError::PartialDelete`] is reported, so no orphaned
    /// messages can exist and the caller never believes a half-finished
    /// delete succeeded.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), FlowchatError> {
        if let Err(e) = self.ledger.delete_by_session(session_id).await {
            increment_counter!("flowchat_delete_failures_total");
            return Err(OrchestratorError::PartialDelete {
                session_id: session_id.to_string(),
                reason: e.to_string(),
            }
            .into());
        }

        self.sessions.delete(session_id).await?;
        increment_counter!("flowchat_sessions_deleted_total");
        tracing::info!(session_id, "Deleted session and its messages");

        let mut view = self.view();
        if view.active_session.as_deref() == Some(session_id) {
            view.reset_to(None, Vec::new());
        }
        Ok(())
    }

    /// Mark the session as having a turn in flight, or reject Busy
    fn claim_flight(&self, session_id: &str) -> Result<FlightGuard<'_>, FlowchatError> {
        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        if !in_flight.insert(session_id.to_string()) {
            return Err(OrchestratorError::Busy(session_id.to_string()).into());
        }
        Ok(FlightGuard {
            in_flight: &self.in_flight,
            session_id: session_id.to_string(),
        })
    }

    /// Ledger count at send time, driving the one-shot rename rule
    ///
    /// A count failure disables the rename for this turn rather than
    /// failing the send; the title can still be derived by a later client
    /// if the session genuinely has no messages.
    async fn pre_send_count(&self, session_id: &str) -> u64 {
        match self.ledger.count_by_session(session_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(session_id, "Pre-send count failed: {}", e);
                u64::MAX
            }
        }
    }

    /// Build an optimistic message that has not been persisted yet
    fn local_message(&self, session_id: &str, sender: Sender, content: &str) -> Message {
        let seq = self.local_seq.fetch_add(1, Ordering::SeqCst);
        Message {
            id: format!("local-{}", seq),
            session_id: session_id.to_string(),
            sender,
            content: content.to_string(),
            timestamp: Utc::now(),
            seq,
        }
    }

    /// Persist one completed turn: user message, AI reply, session metadata
    ///
    /// The two appends run strictly in order so the user message always
    /// precedes its paired reply. Failures are logged and folded into a
    /// single description; they never unwind the already-obtained reply.
    async fn persist_turn(
        &self,
        session_id: &str,
        user_text: &str,
        reply: &str,
        pre_count: u64,
    ) -> (Option<String>, Option<String>) {
        let mut failures: Vec<String> = Vec::new();

        match self.ledger.append(session_id, Sender::User, user_text).await {
            Ok(_) => {
                if let Err(e) = self.ledger.append(session_id, Sender::Ai, reply).await {
                    failures.push(format!("ai append: {}", e));
                }
            }
            // The AI append is skipped so a failed user append cannot leave
            // a reply ordered before its prompt.
            Err(e) => failures.push(format!("user append: {}", e)),
        }

        if let Err(e) = self.sessions.touch(session_id, reply, Utc::now()).await {
            failures.push(format!("touch: {}", e));
        }

        let mut title = None;
        if pre_count == 0 {
            let derived = derive_title(user_text);
            match self.sessions.rename(session_id, &derived).await {
                Ok(()) => title = Some(derived),
                Err(StoreError::NotFound(_)) => {
                    // Session deleted concurrently; the rename is a no-op.
                    tracing::debug!(session_id, "Rename skipped, session gone");
                }
                Err(e) => failures.push(format!("rename: {}", e)),
            }
        }

        let persist_error = if failures.is_empty() {
            None
        } else {
            increment_counter!("flowchat_persist_failures_total");
            let description = failures.join("; ");
            tracing::warn!(session_id, "Turn persistence incomplete: {}", description);
            Some(description)
        };

        (title, persist_error)
    }
}

/// Convenience check for the reply/store error split at call sites
///
/// Returns true when the error means the reply was never obtained, so the
/// caller may retry the upstream call without risking a duplicate reply.
pub fn is_reply_failure(error: &FlowchatError) -> bool {
    matches!(
        error,
        FlowchatError::Proxy(
            ProxyError::Timeout
                | ProxyError::UpstreamUnavailable { .. }
                | ProxyError::MalformedResponse(_)
        )
    )
}
