//! The axum surface: payload handling, rate limits, error mapping, admin
//! endpoints. Each test drives the real router with `tower::oneshot`.

use crate::actors::messages::AppError;
use crate::database;
use crate::http::{
    self, AdminChatsResponse, AnalyticsResponse, ChatReply, ClearChatsResponse, HealthResponse,
    HistoryResponse, ReloadResponse,
};
use crate::tests::support::{test_settings, test_state};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt;

const CLIENT_IP: &str = "203.0.113.7";

fn chat_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

async fn body_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn default_router() -> (Router, sqlx::SqlitePool, tempfile::TempDir) {
    let (state, _generator, pool, dir) =
        test_state(test_settings(), Ok("A generated reply.".to_string())).await;
    (http::router(state), pool, dir)
}

#[tokio::test]
async fn test_chat_pricing_is_answered_and_persisted() {
    let (router, pool, _dir) = default_router().await;

    let response = router
        .clone()
        .oneshot(chat_request(
            "/api/chat",
            json!({"message": "How much does a pass cost?", "sessionId": "s1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply: ChatReply = body_json(response).await;
    assert!(reply.reply.contains("passes and pricing"));

    // Both sides of the exchange were stored under the caller's address.
    let history = database::get_history(&pool, CLIENT_IP).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender, "user");
    assert_eq!(history[1].sender, "bot");
}

#[tokio::test]
async fn test_chat_general_goes_through_generator() {
    let (router, _pool, _dir) = default_router().await;

    let response = router
        .oneshot(chat_request(
            "/api/chat",
            json!({
                "message": "tell me about iyengar yoga",
                "sessionId": "s1",
                "conversationHistory": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply: ChatReply = body_json(response).await;
    assert_eq!(reply.reply, "A generated reply.");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let (router, _pool, _dir) = default_router().await;

    let response = router
        .oneshot(chat_request("/api/chat", json!({"message": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_session_id_rejected_when_required() {
    let mut settings = test_settings();
    settings.require_session_id = true;
    let (state, _generator, _pool, _dir) =
        test_state(settings, Ok("unused".to_string())).await;
    let router = http::router(state);

    let response = router
        .clone()
        .oneshot(chat_request("/api/chat", json!({"message": "hello there"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // With a session id the same request goes through.
    let response = router
        .oneshot(chat_request(
            "/api/chat",
            json!({"message": "hello there", "sessionId": "s9"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_excess_yields_429_with_headers() {
    let mut settings = test_settings();
    settings.rate_limit = 2;
    let (state, _generator, _pool, _dir) =
        test_state(settings, Ok("ok".to_string())).await;
    let router = http::router(state);

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(chat_request(
                "/api/chat",
                json!({"message": "what is the cost?", "sessionId": "limited"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(chat_request(
            "/api/chat",
            json!({"message": "what is the cost?", "sessionId": "limited"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );
    assert!(response.headers().contains_key("retry-after"));
    let reply: ChatReply = body_json(response).await;
    assert!(reply.reply.contains("Rate limit exceeded"));

    // A different session in the same window is not limited.
    let response = router
        .oneshot(chat_request(
            "/api/chat",
            json!({"message": "what is the cost?", "sessionId": "fresh"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_generator_failure_maps_to_apology() {
    let (state, _generator, _pool, _dir) = test_state(
        test_settings(),
        Err(AppError::Upstream {
            status: 500,
            message: "boom".to_string(),
        }),
    )
    .await;
    let router = http::router(state);

    let response = router
        .oneshot(chat_request(
            "/api/chat",
            json!({"message": "an open question about yoga history", "sessionId": "s1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let reply: ChatReply = body_json(response).await;
    assert_eq!(reply.reply, "Oops! Something went wrong.");
}

#[tokio::test]
async fn test_history_roundtrip() {
    let (router, pool, _dir) = default_router().await;

    database::store_message(&pool, CLIENT_IP, "user", "stored earlier")
        .await
        .unwrap();

    let response = router.oneshot(get_request("/api/chat")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history: HistoryResponse = body_json(response).await;
    assert_eq!(history.messages.len(), 1);
    assert_eq!(history.messages[0].content, "stored earlier");
}

#[tokio::test]
async fn test_health_reports_healthy_with_database() {
    let (router, _pool, _dir) = default_router().await;

    let response = router.oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = body_json(response).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.database, "healthy");
    assert!(health.knowledge_sections > 0);
}

#[tokio::test]
async fn test_ephemeral_stores_analytics_but_no_transcript() {
    let (router, pool, _dir) = default_router().await;

    let response = router
        .oneshot(chat_request(
            "/api/chat/ephemeral",
            json!({
                "message": "what should I bring to class?",
                "sessionId": "eph",
                "analyticsData": {
                    "messageCount": 3,
                    "sessionDuration": 40,
                    "quickActionsUsed": ["Pricing"]
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let history = database::get_history(&pool, CLIENT_IP).await.unwrap();
    assert!(history.is_empty());

    let analytics = database::get_analytics(&pool).await.unwrap();
    assert_eq!(analytics.len(), 1);
    assert_eq!(analytics[0].message_count, 3);
    assert!(analytics[0].is_ephemeral);
    // The raw address never lands in analytics.
    assert_ne!(analytics[0].ip_hash, CLIENT_IP);
    assert_eq!(analytics[0].ip_hash, crate::net::hash_ip(CLIENT_IP));
}

#[tokio::test]
async fn test_analytics_summary() {
    let (router, _pool, _dir) = default_router().await;

    // Two ephemeral exchanges feed the summary.
    for question in ["what classes are good for beginners?", "what classes are good for beginners?"] {
        router
            .clone()
            .oneshot(chat_request(
                "/api/chat/ephemeral",
                json!({
                    "message": question,
                    "analyticsData": {"messageCount": 2, "quickActionsUsed": ["Pricing"]}
                }),
            ))
            .await
            .unwrap();
    }

    let response = router.oneshot(get_request("/api/analytics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let analytics: AnalyticsResponse = body_json(response).await;
    assert_eq!(analytics.summary.total_sessions, 2);
    assert_eq!(analytics.summary.average_message_count, 2.0);
    assert_eq!(analytics.summary.most_used_quick_actions[0].name, "Pricing");
    assert_eq!(analytics.summary.most_used_quick_actions[0].count, 2);
    assert_eq!(
        analytics.summary.common_questions[0].name,
        "what classes are good for beginners?"
    );
}

#[tokio::test]
async fn test_admin_chats_list_and_clear() {
    let (router, pool, _dir) = default_router().await;

    database::store_message(&pool, "ip:a", "user", "first").await.unwrap();
    database::store_message(&pool, "ip:a", "bot", "second").await.unwrap();
    database::store_message(&pool, "ip:b", "user", "third").await.unwrap();

    let response = router
        .clone()
        .oneshot(get_request("/api/admin/chats"))
        .await
        .unwrap();
    let chats: AdminChatsResponse = body_json(response).await;
    assert_eq!(chats.total_chats, 2);
    let first = chats.chats.iter().find(|c| c.client == "ip:a").unwrap();
    assert_eq!(first.message_count, 2);
    assert_eq!(first.last_message.as_ref().unwrap().content, "second");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/chats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let cleared: ClearChatsResponse = body_json(response).await;
    assert_eq!(cleared.cleared_count, 3);

    let response = router.oneshot(get_request("/api/admin/chats")).await.unwrap();
    let chats: AdminChatsResponse = body_json(response).await;
    assert_eq!(chats.total_chats, 0);
}

#[tokio::test]
async fn test_knowledge_reload_endpoint() {
    let (router, _pool, _dir) = default_router().await;

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/knowledge/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reload: ReloadResponse = body_json(response).await;
    // The test store has no backing directory; a reload finds nothing.
    assert_eq!(reload.sections, 0);
}
