//! Shared fixtures for the integration-level tests.

use crate::actors::messages::AppError;
use crate::actors::supervisor::SupervisorHandle;
use crate::actors::traits::Generator;
use crate::config::Settings;
use crate::database;
use crate::http::{AppState, SharedState};
use crate::knowledge::{KnowledgeEntry, KnowledgeStore};
use crate::models::ChatTurn;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A generator that returns a canned response and remembers the last request
/// it saw.
pub struct MockGenerator {
    response: Mutex<Result<String, AppError>>,
    last_request: Mutex<Option<Vec<ChatTurn>>>,
}

impl MockGenerator {
    pub fn new(response: Result<String, AppError>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            last_request: Mutex::new(None),
        })
    }

    pub fn last_request(&self) -> Option<Vec<ChatTurn>> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn was_called(&self) -> bool {
        self.last_request.lock().unwrap().is_some()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, AppError> {
        *self.last_request.lock().unwrap() = Some(turns);
        self.response.lock().unwrap().clone()
    }
}

pub fn entry(title: &str, content: &str, tags: &[&str], priority: i32) -> KnowledgeEntry {
    KnowledgeEntry {
        title: title.to_string(),
        content: content.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        priority,
    }
}

/// A small but realistic corpus.
pub fn studio_knowledge() -> Arc<KnowledgeStore> {
    Arc::new(KnowledgeStore::from_entries(vec![
        entry(
            "Beginner Pass",
            "2-Week Unlimited introduction pass for $49",
            &["pricing", "beginner", "pass"],
            6,
        ),
        entry(
            "Weekly Membership",
            "Unlimited classes for $35 per week",
            &["membership", "pricing"],
            5,
        ),
        entry(
            "Iyengar Classes",
            "Daily Iyengar yoga classes for all levels",
            &["classes", "yoga"],
            5,
        ),
        entry(
            "bot_personality - 1",
            "Be warm and concise",
            &["personality"],
            7,
        ),
    ]))
}

pub fn test_settings() -> Settings {
    Settings {
        bind_addr: "127.0.0.1:0".to_string(),
        openai_api_key: "sk-test".to_string(),
        openai_base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: 0.7,
        generator_timeout_secs: 5,
        knowledge_dir: PathBuf::new(),
        db_path: PathBuf::new(),
        rate_limit: 100,
        rate_window_secs: 60,
        upstream_limit: 1000,
        upstream_window_secs: 60,
        session_capacity: 16,
        require_session_id: false,
    }
}

/// Opens a pool over a database file inside a fresh temp directory. The
/// directory guard must outlive the pool.
pub async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.sqlite").display());
    let pool = database::init_db(&url).await.unwrap();
    (pool, dir)
}

/// The full HTTP state over a mock generator and the studio corpus.
pub async fn test_state(
    settings: Settings,
    reply: Result<String, AppError>,
) -> (SharedState, Arc<MockGenerator>, SqlitePool, TempDir) {
    let (pool, dir) = test_pool().await;
    let knowledge = studio_knowledge();
    let generator = MockGenerator::new(reply);
    let supervisor =
        SupervisorHandle::spawn(generator.clone(), knowledge.clone(), settings.session_capacity);
    let state = AppState::new(&settings, supervisor, knowledge, Some(pool.clone()));
    (state, generator, pool, dir)
}
