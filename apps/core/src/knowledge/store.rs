//! The in-memory knowledge collection.
//!
//! Read-many/write-rare: queries clone an `Arc` snapshot, and `reload`
//! replaces the whole collection with a single pointer swap, so readers never
//! observe a partially loaded corpus.

use super::{loader, relevance, KnowledgeEntry};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

pub struct KnowledgeStore {
    dir: PathBuf,
    sections: RwLock<Arc<Vec<KnowledgeEntry>>>,
}

impl KnowledgeStore {
    /// Loads the corpus from `dir`. An empty or missing directory yields an
    /// empty store; callers must cope with zero entries.
    pub fn load(dir: &Path) -> Self {
        let sections = loader::load_dir(dir);
        info!("Total sections loaded: {}", sections.len());

        Self {
            dir: dir.to_path_buf(),
            sections: RwLock::new(Arc::new(sections)),
        }
    }

    /// Builds a store directly from entries. Test seam; skips the filesystem.
    #[cfg(test)]
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            dir: PathBuf::new(),
            sections: RwLock::new(Arc::new(entries)),
        }
    }

    /// Re-reads the corpus directory and atomically replaces the collection.
    pub fn reload(&self) -> usize {
        let sections = loader::load_dir(&self.dir);
        let count = sections.len();
        info!("Reloaded knowledge base: {} sections", count);

        let mut guard = self
            .sections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(sections);
        count
    }

    /// A consistent snapshot of the current collection.
    pub fn snapshot(&self) -> Arc<Vec<KnowledgeEntry>> {
        self.sections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every non-empty entry rendered as `## title` blocks, sorted by
    /// descending priority. Stable, so the output is identical across calls
    /// for an unchanged corpus.
    pub fn all_content(&self) -> String {
        let snapshot = self.snapshot();
        let mut sections: Vec<&KnowledgeEntry> = snapshot
            .iter()
            .filter(|s| !s.title.is_empty() && !s.content.is_empty())
            .collect();
        sections.sort_by(|a, b| b.priority.cmp(&a.priority));

        sections
            .iter()
            .map(|s| s.render())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Top-`limit` entries relevant to `query`. See [`relevance::select`].
    pub fn relevant_sections(&self, query: &str, limit: usize) -> Vec<KnowledgeEntry> {
        relevance::select(&self.snapshot(), query, limit)
    }

    /// Entries carrying exactly `tag`.
    pub fn sections_by_tag(&self, tag: &str) -> Vec<KnowledgeEntry> {
        self.snapshot()
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .cloned()
            .collect()
    }
}
