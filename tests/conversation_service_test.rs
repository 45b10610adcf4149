//! Conversation service HTTP client integration tests
//!
//! Runs `HttpConversationService` against a `wiremock` server and checks the
//! wire format of every endpoint: query parameters for list and start, JSON
//! bodies for continue and update, and the `{"data": ...}` response envelope.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatdesk::error::ChatdeskError;
use chatdesk::services::{
    ContinueRequest, ConversationService, ConversationUpdate, HttpConversationService, ListQuery,
    StartRequest,
};
use chatdesk::session::{Message, Role};

fn make_service(server: &MockServer) -> HttpConversationService {
    let config = common::config_for(&server.uri());
    HttpConversationService::new(&config.service).expect("service")
}

fn start_request() -> StartRequest {
    StartRequest {
        user_id: "u1".to_string(),
        message: "Hello".to_string(),
        context_type: "contextual".to_string(),
        client_id: "c1".to_string(),
        branch_id: "b1".to_string(),
    }
}

#[tokio::test]
async fn test_list_sends_query_and_parses_summaries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/conversations"))
        .and(query_param("user_id", "u1"))
        .and(query_param("status", "active"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "conversations": [
                    {"id": "k1", "title": "Sales questions", "message_count": 4},
                    {"id": "k2", "title": null, "message_count": 1}
                ],
                "total": 22,
                "page": 2
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = make_service(&server)
        .list(&ListQuery {
            user_id: "u1".to_string(),
            page: 2,
            page_size: 20,
        })
        .await
        .expect("list should succeed");

    assert_eq!(page.page, 2);
    assert_eq!(page.total, Some(22));
    assert_eq!(page.conversations.len(), 2);
    assert_eq!(page.conversations[0].id, "k1");
    assert_eq!(page.conversations[1].title, None);
    assert_eq!(page.conversations[1].display_title(false), "Untitled conversation");
}

#[tokio::test]
async fn test_detail_parses_messages_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/conversations/k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "k1",
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi there"}
                ]
            }
        })))
        .mount(&server)
        .await;

    let messages = make_service(&server).detail("k1").await.expect("detail");

    assert_eq!(
        messages,
        vec![Message::user("Hello"), Message::assistant("Hi there")]
    );
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_detail_rejects_unknown_role() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/conversations/k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"messages": [{"role": "system", "content": "hidden"}]}
        })))
        .mount(&server)
        .await;

    let err = make_service(&server).detail("k1").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChatdeskError>(),
        Some(ChatdeskError::Payload { .. })
    ));
}

#[tokio::test]
async fn test_start_sends_arguments_as_query_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai/conversations/start"))
        .and(query_param("user_id", "u1"))
        .and(query_param("message", "Hello"))
        .and(query_param("context_type", "contextual"))
        .and(query_param("client_id", "c1"))
        .and(query_param("branch_id", "b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"conversation_id": "k1", "response": "Hi there"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = make_service(&server)
        .start(&start_request())
        .await
        .expect("start");

    assert_eq!(reply.conversation_id, "k1");
    assert_eq!(reply.response, "Hi there");
}

#[tokio::test]
async fn test_start_without_conversation_id_is_payload_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai/conversations/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"response": "Hi there"}
        })))
        .mount(&server)
        .await;

    let err = make_service(&server)
        .start(&start_request())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("conversation_id"));
}

#[tokio::test]
async fn test_continue_posts_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai/conversations/k1/continue"))
        .and(body_json(json!({
            "conversation_id": "k1",
            "message": "And last month?",
            "model": "gpt-4-1106-preview",
            "temperature": 0.5,
            "max_tokens": 2000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"conversation_id": "k1", "response": "Down 3%"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = make_service(&server)
        .continue_conversation(&ContinueRequest {
            conversation_id: "k1".to_string(),
            message: "And last month?".to_string(),
            model: "gpt-4-1106-preview".to_string(),
            temperature: 0.5,
            max_tokens: 2000,
        })
        .await
        .expect("continue");

    assert_eq!(reply.response, "Down 3%");
}

#[tokio::test]
async fn test_update_sends_patch_bodies() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/ai/conversations/k1"))
        .and(body_json(json!({"title": "Quarterly review"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/ai/conversations/k2"))
        .and(body_json(json!({"status": "archived"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = make_service(&server);
    service
        .update("k1", &ConversationUpdate::Title("Quarterly review".to_string()))
        .await
        .expect("retitle");
    service
        .update("k2", &ConversationUpdate::Archive)
        .await
        .expect("archive");
}

#[tokio::test]
async fn test_non_success_status_keeps_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/conversations/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("conversation not found"))
        .mount(&server)
        .await;

    let err = make_service(&server).detail("missing").await.unwrap_err();
    match err.downcast_ref::<ChatdeskError>() {
        Some(ChatdeskError::ServiceStatus { status, body, .. }) => {
            assert_eq!(*status, 404);
            assert_eq!(body, "conversation not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_data_is_payload_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let err = make_service(&server)
        .list(&ListQuery {
            user_id: "u1".to_string(),
            page: 1,
            page_size: 20,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no data"));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/conversations/k1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"messages": []}}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = common::config_for(&server.uri());
    config.service.timeouts.read_seconds = 1;
    let service = HttpConversationService::new(&config.service).expect("service");

    let err = service.detail("k1").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChatdeskError>(),
        Some(ChatdeskError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let mut config = common::config_for("http://127.0.0.1:1");
    config.service.timeouts.read_seconds = 1;
    let service = HttpConversationService::new(&config.service).expect("service");

    let err = service.detail("k1").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChatdeskError>(),
        Some(ChatdeskError::Transport { .. })
    ));
}
