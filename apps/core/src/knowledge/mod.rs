//! # Knowledge Module
//!
//! The studio's local knowledge corpus: loading, storage and retrieval.
//!
//! ## Components
//! - `loader`: parses the JSON corpus into normalized entries
//! - `store`: owns the in-memory collection, supports atomic reload
//! - `relevance`: keyword scoring used to pick entries for a prompt

pub mod loader;
pub mod relevance;
pub mod store;

pub use store::KnowledgeStore;

use serde::{Deserialize, Serialize};

/// One titled, tagged, prioritized snippet of studio information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub priority: i32,
}

impl KnowledgeEntry {
    /// Renders the entry the way it appears inside a prompt.
    pub fn render(&self) -> String {
        format!("## {}\n\n{}", self.title, self.content)
    }
}
