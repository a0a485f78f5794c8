use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// The author of a chat turn as seen by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

/// The role of a turn in a generator conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One turn of a generator conversation: the unit the prompt assembler
/// produces and the generator client sends over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    #[allow(dead_code)]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// A persisted transcript row, keyed by the sanitized client address.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredMessage {
    /// The unique identifier for the message (UUID).
    pub id: String,
    /// The sanitized client address this message belongs to.
    pub client_key: String,
    /// The sender of the message ("user" or "bot").
    pub sender: String,
    /// The text content of the message.
    pub content: String,
    /// Unix timestamp of when the message was created.
    pub created_at: i64,
}

/// An anonymized analytics record for one chat session.
///
/// Only a hash of the client address is kept; the raw address never reaches
/// this table.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ChatAnalytics {
    /// The unique identifier for the record (UUID).
    pub id: String,
    /// Unix timestamp of when the record was written.
    pub recorded_at: i64,
    /// Number of messages exchanged in the session so far.
    pub message_count: i64,
    /// Session duration in seconds, if the widget reported one.
    #[serde(default)]
    pub session_duration_secs: Option<i64>,
    /// Questions the user asked.
    pub user_questions: Json<Vec<String>>,
    /// Replies the bot produced.
    pub bot_responses: Json<Vec<String>>,
    /// Quick-action buttons the user pressed.
    pub quick_actions_used: Json<Vec<String>>,
    /// Whether the session ran in ephemeral (no-transcript) mode.
    pub is_ephemeral: bool,
    /// SHA-256 hash of the client address.
    pub ip_hash: String,
}
