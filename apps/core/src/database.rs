use crate::models::{ChatAnalytics, StoredMessage};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Opens (creating if necessary) the database at `db_url` and applies the
/// schema. Pass `sqlite::memory:` for an in-memory database in tests.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    info!("Initializing database at: {}", db_url);

    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id TEXT PRIMARY KEY,
            client_key TEXT NOT NULL,
            sender TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chat_messages_client
            ON chat_messages(client_key, created_at);
        CREATE TABLE IF NOT EXISTS chat_analytics (
            id TEXT PRIMARY KEY,
            recorded_at INTEGER NOT NULL,
            message_count INTEGER NOT NULL,
            session_duration_secs INTEGER,
            user_questions JSON NOT NULL,
            bot_responses JSON NOT NULL,
            quick_actions_used JSON NOT NULL,
            is_ephemeral BOOLEAN NOT NULL,
            ip_hash TEXT NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await?;

    info!("Database initialized and migrations applied.");

    Ok(pool)
}

// --- Transcript CRUD ---

pub async fn store_message(
    pool: &SqlitePool,
    client_key: &str,
    sender: &str,
    content: &str,
) -> Result<StoredMessage, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().timestamp();

    sqlx::query_as::<_, StoredMessage>(
        r#"
        INSERT INTO chat_messages (id, client_key, sender, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, client_key, sender, content, created_at
        "#,
    )
    .bind(&id)
    .bind(client_key)
    .bind(sender)
    .bind(content)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

/// A client's transcript in chronological order.
pub async fn get_history(
    pool: &SqlitePool,
    client_key: &str,
) -> Result<Vec<StoredMessage>, sqlx::Error> {
    sqlx::query_as::<_, StoredMessage>(
        r#"
        SELECT id, client_key, sender, content, created_at
        FROM chat_messages
        WHERE client_key = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(client_key)
    .fetch_all(pool)
    .await
}

/// Every client key with at least one stored message.
pub async fn client_keys(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT client_key FROM chat_messages ORDER BY client_key")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(key,)| key).collect())
}

/// Deletes every stored transcript, returning how many rows went away.
pub async fn clear_all_histories(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chat_messages").execute(pool).await?;
    Ok(result.rows_affected())
}

// --- Analytics ---

pub async fn store_analytics(
    pool: &SqlitePool,
    record: &ChatAnalytics,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO chat_analytics
            (id, recorded_at, message_count, session_duration_secs,
             user_questions, bot_responses, quick_actions_used, is_ephemeral, ip_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(record.recorded_at)
    .bind(record.message_count)
    .bind(record.session_duration_secs)
    .bind(Json(record.user_questions.0.clone()))
    .bind(Json(record.bot_responses.0.clone()))
    .bind(Json(record.quick_actions_used.0.clone()))
    .bind(record.is_ephemeral)
    .bind(&record.ip_hash)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_analytics(pool: &SqlitePool) -> Result<Vec<ChatAnalytics>, sqlx::Error> {
    sqlx::query_as::<_, ChatAnalytics>(
        r#"
        SELECT id, recorded_at, message_count, session_duration_secs,
               user_questions, bot_responses, quick_actions_used,
               is_ephemeral, ip_hash
        FROM chat_analytics
        ORDER BY recorded_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}
