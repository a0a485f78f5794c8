//! The HTTP surface consumed by the embeddable chat widget.
//!
//! Thin adapters over the supervisor and the stores: request parsing, client
//! identity, rate limiting, error-to-status mapping. No conversational logic
//! lives here.

use crate::actors::supervisor::SupervisorHandle;
use crate::config::Settings;
use crate::database;
use crate::error::AppError;
use crate::knowledge::KnowledgeStore;
use crate::models::{ChatAnalytics, ChatTurn, Sender, StoredMessage};
use crate::net;
use crate::prompt::FALLBACK_REPLY;
use crate::rate_limiter::{RateLimitDecision, RateLimiter};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;
use validator::Validate;

const RATE_LIMITED_REPLY: &str = "Rate limit exceeded. Please try again later.";
const UPSTREAM_BUSY_REPLY: &str =
    "Service temporarily unavailable due to high demand. Please try again in a few minutes.";

/// Everything the handlers share.
pub struct AppState {
    pub supervisor: SupervisorHandle,
    pub knowledge: Arc<KnowledgeStore>,
    pub pool: Option<SqlitePool>,
    pub client_limiter: Mutex<RateLimiter>,
    pub upstream_limiter: Mutex<RateLimiter>,
    pub require_session_id: bool,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        settings: &Settings,
        supervisor: SupervisorHandle,
        knowledge: Arc<KnowledgeStore>,
        pool: Option<SqlitePool>,
    ) -> SharedState {
        Arc::new(Self {
            supervisor,
            knowledge,
            pool,
            client_limiter: Mutex::new(RateLimiter::new(
                settings.rate_limit,
                std::time::Duration::from_secs(settings.rate_window_secs),
            )),
            upstream_limiter: Mutex::new(RateLimiter::new(
                settings.upstream_limit,
                std::time::Duration::from_secs(settings.upstream_window_secs),
            )),
            require_session_id: settings.require_session_id,
            started_at: Instant::now(),
        })
    }
}

/// Builds the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler).get(history_handler))
        .route("/api/chat/ephemeral", post(ephemeral_handler))
        .route("/api/health", get(health_handler))
        .route("/api/analytics", get(analytics_handler))
        .route(
            "/api/admin/chats",
            get(admin_chats_handler).delete(admin_clear_handler),
        )
        .route("/api/admin/knowledge/reload", post(knowledge_reload_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- Request / Response types ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub analytics_data: Option<AnalyticsData>,
}

/// Optional analytics payload the widget attaches to ephemeral requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub message_count: Option<i64>,
    pub session_duration: Option<i64>,
    pub user_questions: Option<Vec<String>>,
    pub bot_responses: Option<Vec<String>>,
    pub quick_actions_used: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<StoredMessage>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub database: String,
    pub knowledge_sections: usize,
    pub uptime_secs: u64,
}

#[derive(Serialize, Deserialize)]
pub struct CountEntry {
    pub name: String,
    pub count: u64,
}

#[derive(Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_sessions: usize,
    pub average_message_count: f64,
    pub average_session_duration_secs: f64,
    pub most_used_quick_actions: Vec<CountEntry>,
    pub common_questions: Vec<CountEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub analytics: Vec<ChatAnalytics>,
    pub summary: AnalyticsSummary,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize)]
pub struct AdminChat {
    pub client: String,
    pub message_count: usize,
    pub last_message: Option<StoredMessage>,
    pub messages: Vec<StoredMessage>,
}

#[derive(Serialize, Deserialize)]
pub struct AdminChatsResponse {
    pub total_chats: usize,
    pub chats: Vec<AdminChat>,
}

#[derive(Serialize, Deserialize)]
pub struct ClearChatsResponse {
    pub message: String,
    pub cleared_count: u64,
}

#[derive(Serialize, Deserialize)]
pub struct ReloadResponse {
    pub sections: usize,
}

// --- Handlers ---

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return validation_response(e);
    }

    let client = net::client_ip(&headers);
    let session_key = match conversation_key(&payload.session_id, &state) {
        Ok(key) => key,
        Err(response) => return response,
    };

    if let Some(response) = enforce_limits(&state, &rate_key(&payload.session_id, &client)) {
        return response;
    }

    persist_message(&state, &client, Sender::User, &payload.message).await;

    match state
        .supervisor
        .process_message(
            session_key,
            payload.message.clone(),
            payload.conversation_history.clone(),
        )
        .await
    {
        Ok(reply) => {
            persist_message(&state, &client, Sender::Bot, &reply).await;
            Json(ChatReply { reply }).into_response()
        }
        Err(e) => error_reply(e),
    }
}

async fn ephemeral_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return validation_response(e);
    }

    let client = net::client_ip(&headers);

    if let Some(response) = enforce_limits(&state, &rate_key(&payload.session_id, &client)) {
        return response;
    }

    // No transcript storage in ephemeral mode; messages only live in the
    // widget for the duration of the session.
    match state
        .supervisor
        .process_ephemeral(payload.message.clone(), payload.conversation_history.clone())
        .await
    {
        Ok(reply) => {
            if let Some(data) = &payload.analytics_data {
                store_ephemeral_analytics(&state, &client, data, &payload.message, &reply).await;
            }
            Json(ChatReply { reply }).into_response()
        }
        Err(e) => error_reply(e),
    }
}

async fn history_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let client = net::client_ip(&headers);

    let messages = match &state.pool {
        Some(pool) => database::get_history(pool, &client).await.unwrap_or_else(|e| {
            warn!("Failed to read chat history: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    Json(HistoryResponse { messages }).into_response()
}

async fn health_handler(State(state): State<SharedState>) -> Response {
    let database = match &state.pool {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "healthy",
            Err(e) => {
                error!("Database health check failed: {}", e);
                "unhealthy"
            }
        },
        None => "unavailable",
    };

    let body = HealthResponse {
        status: if database == "healthy" {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        knowledge_sections: state.knowledge.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    };

    let status = if database == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body)).into_response()
}

async fn analytics_handler(State(state): State<SharedState>) -> Response {
    let records = match &state.pool {
        Some(pool) => database::get_analytics(pool).await.unwrap_or_else(|e| {
            warn!("Failed to read analytics: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    let summary = summarize(&records);

    Json(AnalyticsResponse {
        analytics: records,
        summary,
        timestamp: Utc::now().to_rfc3339(),
    })
    .into_response()
}

async fn admin_chats_handler(State(state): State<SharedState>) -> Response {
    let Some(pool) = &state.pool else {
        return Json(AdminChatsResponse {
            total_chats: 0,
            chats: Vec::new(),
        })
        .into_response();
    };

    let keys = match database::client_keys(pool).await {
        Ok(keys) => keys,
        Err(e) => {
            error!("Failed to list chat histories: {}", e);
            return internal_error("Failed to retrieve chat histories");
        }
    };

    let histories = join_all(keys.iter().map(|key| database::get_history(pool, key))).await;

    let chats: Vec<AdminChat> = keys
        .into_iter()
        .zip(histories)
        .map(|(client, history)| {
            let messages = history.unwrap_or_default();
            AdminChat {
                client,
                message_count: messages.len(),
                last_message: messages.last().cloned(),
                messages,
            }
        })
        .collect();

    Json(AdminChatsResponse {
        total_chats: chats.len(),
        chats,
    })
    .into_response()
}

async fn admin_clear_handler(State(state): State<SharedState>) -> Response {
    let Some(pool) = &state.pool else {
        return Json(ClearChatsResponse {
            message: "No chat histories found".to_string(),
            cleared_count: 0,
        })
        .into_response();
    };

    match database::clear_all_histories(pool).await {
        Ok(cleared_count) => Json(ClearChatsResponse {
            message: format!("Cleared {} chat messages", cleared_count),
            cleared_count,
        })
        .into_response(),
        Err(e) => {
            error!("Failed to clear chat histories: {}", e);
            internal_error("Failed to clear chat histories")
        }
    }
}

async fn knowledge_reload_handler(State(state): State<SharedState>) -> Response {
    let sections = state.knowledge.reload();
    Json(ReloadResponse { sections }).into_response()
}

// --- Helpers ---

/// The key conversation state is tracked under. An absent session id falls
/// back to the shared "default" key unless configuration forbids it.
fn conversation_key(session_id: &Option<String>, state: &AppState) -> Result<String, Response> {
    match session_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(session) => Ok(session.to_string()),
        None if state.require_session_id => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "sessionId is required".to_string(),
            }),
        )
            .into_response()),
        None => Ok("default".to_string()),
    }
}

/// The key rate limiting is tracked under: the session when supplied,
/// otherwise the client address.
fn rate_key(session_id: &Option<String>, client: &str) -> String {
    match session_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(session) => format!("session:{}", session),
        None => format!("ip:{}", client),
    }
}

/// Runs both limiting layers, returning the refusal response when either
/// window is exhausted.
fn enforce_limits(state: &AppState, key: &str) -> Option<Response> {
    let (decision, limit) = {
        let mut limiter = lock_limiter(&state.client_limiter);
        (limiter.check(key), limiter.limit())
    };
    if decision.limited {
        return Some(rate_limited_response(
            StatusCode::TOO_MANY_REQUESTS,
            RATE_LIMITED_REPLY,
            limit,
            &decision,
        ));
    }

    let (decision, limit) = {
        let mut limiter = lock_limiter(&state.upstream_limiter);
        (limiter.check("upstream"), limiter.limit())
    };
    if decision.limited {
        return Some(rate_limited_response(
            StatusCode::SERVICE_UNAVAILABLE,
            UPSTREAM_BUSY_REPLY,
            limit,
            &decision,
        ));
    }

    None
}

fn lock_limiter(limiter: &Mutex<RateLimiter>) -> std::sync::MutexGuard<'_, RateLimiter> {
    limiter.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn rate_limited_response(
    status: StatusCode,
    reply: &str,
    limit: u32,
    decision: &RateLimitDecision,
) -> Response {
    let retry_after_secs = decision.reset_after.as_secs().max(1);

    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", numeric_header(limit as u64));
    headers.insert("x-ratelimit-remaining", numeric_header(decision.remaining as u64));
    headers.insert("retry-after", numeric_header(retry_after_secs));

    (
        status,
        headers,
        Json(ChatReply {
            reply: reply.to_string(),
        }),
    )
        .into_response()
}

fn numeric_header(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

fn validation_response(errors: validator::ValidationErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Validation errors: {}", errors),
        }),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Maps a pipeline failure to the uniform fallback reply. Persistence never
/// routes through here; its failures are logged and swallowed.
fn error_reply(e: AppError) -> Response {
    error!("Chat pipeline error: {}", e);

    let (status, reply) = match e {
        AppError::Validation(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: message }),
            )
                .into_response();
        }
        AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_REPLY),
        AppError::Upstream { status: 429, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, UPSTREAM_BUSY_REPLY)
        }
        AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, FALLBACK_REPLY),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, FALLBACK_REPLY),
    };

    (
        status,
        Json(ChatReply {
            reply: reply.to_string(),
        }),
    )
        .into_response()
}

/// Stores one transcript row. Failures are logged and never surface to the
/// reply path.
async fn persist_message(state: &AppState, client_key: &str, sender: Sender, content: &str) {
    if let Some(pool) = &state.pool {
        if let Err(e) = database::store_message(pool, client_key, sender.as_str(), content).await {
            warn!("Failed to store chat message: {}", e);
        }
    }
}

/// Writes the anonymized analytics record for an ephemeral exchange.
async fn store_ephemeral_analytics(
    state: &AppState,
    client: &str,
    data: &AnalyticsData,
    message: &str,
    reply: &str,
) {
    let Some(pool) = &state.pool else {
        return;
    };

    let record = ChatAnalytics {
        id: Uuid::new_v4().to_string(),
        recorded_at: Utc::now().timestamp(),
        message_count: data.message_count.unwrap_or(1),
        session_duration_secs: data.session_duration,
        user_questions: SqlJson(
            data.user_questions
                .clone()
                .unwrap_or_else(|| vec![message.to_string()]),
        ),
        bot_responses: SqlJson(
            data.bot_responses
                .clone()
                .unwrap_or_else(|| vec![reply.to_string()]),
        ),
        quick_actions_used: SqlJson(data.quick_actions_used.clone().unwrap_or_default()),
        is_ephemeral: true,
        ip_hash: net::hash_ip(client),
    };

    if let Err(e) = database::store_analytics(pool, &record).await {
        warn!("Failed to store analytics: {}", e);
    }
}

/// Aggregates raw analytics records into the summary the dashboard shows.
fn summarize(records: &[ChatAnalytics]) -> AnalyticsSummary {
    let total = records.len();

    let average_message_count = if total == 0 {
        0.0
    } else {
        records.iter().map(|r| r.message_count as f64).sum::<f64>() / total as f64
    };

    let with_duration: Vec<i64> = records
        .iter()
        .filter_map(|r| r.session_duration_secs)
        .collect();
    let average_session_duration_secs = if with_duration.is_empty() {
        0.0
    } else {
        with_duration.iter().map(|d| *d as f64).sum::<f64>() / with_duration.len() as f64
    };

    let mut action_counts = std::collections::HashMap::new();
    for record in records {
        for action in record.quick_actions_used.0.iter() {
            *action_counts.entry(action.clone()).or_insert(0u64) += 1;
        }
    }

    let mut question_counts = std::collections::HashMap::new();
    for record in records {
        for question in record.user_questions.0.iter() {
            let normalized = question.to_lowercase().trim().to_string();
            if normalized.len() > 3 {
                *question_counts.entry(normalized).or_insert(0u64) += 1;
            }
        }
    }

    AnalyticsSummary {
        total_sessions: total,
        average_message_count,
        average_session_duration_secs,
        most_used_quick_actions: top_counts(action_counts),
        common_questions: top_counts(question_counts),
    }
}

fn top_counts(counts: std::collections::HashMap<String, u64>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(name, count)| CountEntry { name, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(10);
    entries
}
