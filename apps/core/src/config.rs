//! Runtime configuration.
//!
//! All knobs come from environment variables (a `.env` file is honoured via
//! `dotenv`), with defaults suitable for local development. Values are
//! validated once at startup; a bad value is a configuration error, not a
//! runtime surprise.

use crate::error::AppError;
use crate::fs_manager::PortablePathManager;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;
use validator::Validate;

/// Application settings, resolved from the environment at startup.
#[derive(Debug, Clone, Validate)]
pub struct Settings {
    /// Address the HTTP server binds to.
    #[validate(length(min = 1))]
    pub bind_addr: String,
    /// API key for the OpenAI-compatible text-generation service.
    #[validate(length(min = 1))]
    pub openai_api_key: String,
    /// Base URL of the text-generation service.
    pub openai_base_url: String,
    /// Model identifier sent with every completion request.
    #[validate(length(min = 1))]
    pub model: String,
    /// Sampling temperature for completions. Value between 0.0 and 2.0.
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    /// Per-request timeout for the generator call, in seconds.
    #[validate(range(min = 1))]
    pub generator_timeout_secs: u64,
    /// Directory holding the JSON knowledge corpus.
    pub knowledge_dir: PathBuf,
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum messages per client within one rate-limit window.
    #[validate(range(min = 1))]
    pub rate_limit: u32,
    /// Length of the per-client rate-limit window, in seconds.
    #[validate(range(min = 1))]
    pub rate_window_secs: u64,
    /// Aggregate cap on generator calls within one upstream window.
    #[validate(range(min = 1))]
    pub upstream_limit: u32,
    /// Length of the aggregate upstream window, in seconds.
    #[validate(range(min = 1))]
    pub upstream_window_secs: u64,
    /// Maximum number of conversation states kept in memory.
    #[validate(range(min = 1))]
    pub session_capacity: usize,
    /// When true, requests without a session id are rejected instead of
    /// falling back to the shared "default" key.
    pub require_session_id: bool,
}

impl Settings {
    /// Builds settings from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        let settings = Self {
            bind_addr: env_or("STUDIOCHAT_BIND_ADDR", "127.0.0.1:8787")?,
            openai_api_key: env::var("OPENAI_API_KEY")
                .map_err(|_| AppError::Config("OPENAI_API_KEY is not set".to_string()))?,
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1")?,
            model: env_or("STUDIOCHAT_MODEL", "gpt-4o-mini")?,
            temperature: env_or("STUDIOCHAT_TEMPERATURE", "0.7")?,
            generator_timeout_secs: env_or("STUDIOCHAT_GENERATOR_TIMEOUT_SECS", "30")?,
            knowledge_dir: env::var("STUDIOCHAT_KNOWLEDGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PortablePathManager::knowledge_dir()),
            db_path: env::var("STUDIOCHAT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PortablePathManager::db_dir().join("studiochat.sqlite")),
            rate_limit: env_or("STUDIOCHAT_RATE_LIMIT", "15")?,
            rate_window_secs: env_or("STUDIOCHAT_RATE_WINDOW_SECS", "3600")?,
            upstream_limit: env_or("STUDIOCHAT_UPSTREAM_LIMIT", "100")?,
            upstream_window_secs: env_or("STUDIOCHAT_UPSTREAM_WINDOW_SECS", "60")?,
            session_capacity: env_or("STUDIOCHAT_SESSION_CAPACITY", "1024")?,
            require_session_id: env_or("STUDIOCHAT_REQUIRE_SESSION_ID", "false")?,
        };

        // The base URL must parse; a trailing slash is tolerated and trimmed
        // by the generator client.
        Url::parse(&settings.openai_base_url)?;
        settings.validate()?;

        Ok(settings)
    }
}

/// Reads an environment variable, falling back to `default`, and parses it.
fn env_or<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| AppError::Config(format!("Invalid value for {}: {}", key, e)))
}
