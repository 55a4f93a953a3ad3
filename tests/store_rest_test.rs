//! Remote store integration tests
//!
//! Tests the `RestStore` implementation against a `wiremock` mock server:
//! query parameters, representation-returning mutations, and the
//! Unauthorized / NotFound / Conflict mapping.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowchat::config::StoreConfig;
use flowchat::error::StoreError;
use flowchat::store::{MessageLedger, RestStore, Sender, SessionStore};

fn rest_store(server: &MockServer) -> RestStore {
    RestStore::new(StoreConfig {
        url: server.uri(),
        api_key: Some("anon-key".to_string()),
        ephemeral: false,
    })
    .unwrap()
}

fn session_row(id: &str, owner: &str) -> serde_json::Value {
    json!({
        "id": id,
        "owner": owner,
        "title": "New Chat",
        "lastMessagePreview": "Start a new conversation",
        "updatedAt": "2026-08-25T12:00:00Z"
    })
}

#[tokio::test]
async fn test_list_filters_and_orders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("owner", "eq.alice"))
        .and(query_param("order", "updatedAt.desc"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            session_row("s-2", "alice"),
            session_row("s-1", "alice"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let sessions = store.list("alice").await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, "s-2");
}

#[tokio::test]
async fn test_create_returns_server_assigned_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([session_row(
            "srv-id-1", "alice"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let session = store.create("alice").await.unwrap();
    assert_eq!(session.id, "srv-id-1");
    assert_eq!(session.title, "New Chat");
}

#[tokio::test]
async fn test_get_empty_result_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let err = store.get("missing").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_rename_patches_matching_row() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/sessions"))
        .and(query_param("id", "eq.s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_row(
            "s-1", "alice"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    store.rename("s-1", "Rust questions").await.unwrap();
}

#[tokio::test]
async fn test_rename_no_matching_row_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let err = store.rename("gone", "title").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_unauthorized_status_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let err = store.list("alice").await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));
}

#[tokio::test]
async fn test_conflict_status_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(409).set_body_string("version mismatch"))
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let err = store
        .touch("s-1", "preview", chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_append_message_returns_persisted_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "m-1",
            "sessionId": "s-1",
            "sender": "user",
            "content": "Hello",
            "timestamp": "2026-08-25T12:00:00Z",
            "seq": 17
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let message = store.append("s-1", Sender::User, "Hello").await.unwrap();
    assert_eq!(message.id, "m-1");
    assert_eq!(message.sender, Sender::User);
    assert_eq!(message.seq, 17);
}

#[tokio::test]
async fn test_replay_orders_by_timestamp_then_seq() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(query_param("sessionId", "eq.s-1"))
        .and(query_param("order", "timestamp.asc,seq.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "m-1",
                "sessionId": "s-1",
                "sender": "user",
                "content": "Hello",
                "timestamp": "2026-08-25T12:00:00Z",
                "seq": 1
            },
            {
                "id": "m-2",
                "sessionId": "s-1",
                "sender": "ai",
                "content": "Hi there",
                "timestamp": "2026-08-25T12:00:00Z",
                "seq": 2
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let replay = store.list_by_session("s-1").await.unwrap();
    assert_eq!(replay.len(), 2);
    assert_eq!(replay[0].sender, Sender::User);
    assert_eq!(replay[1].sender, Sender::Ai);
}

#[tokio::test]
async fn test_count_uses_id_projection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(query_param("select", "id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": "m-1"}, {"id": "m-2"}, {"id": "m-3"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    assert_eq!(store.count_by_session("s-1").await.unwrap(), 3);
}

#[tokio::test]
async fn test_delete_by_session_tolerates_zero_rows() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/messages"))
        .and(query_param("sessionId", "eq.s-empty"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server);
    store.delete_by_session("s-empty").await.unwrap();
}

#[tokio::test]
async fn test_delete_session_no_matching_row_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = rest_store(&server);
    let err = SessionStore::delete(&store, "gone").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
