//! Keyword relevance scoring.
//!
//! A heuristic boost layered on the corpus's manual priorities, not a ranking
//! algorithm. Tables are data so the scorer stays independently testable and
//! swappable.

use super::KnowledgeEntry;

/// Query markers that identify a schedule-type question.
const SCHEDULE_MARKERS: &[&str] = &[
    "schedule",
    "timetable",
    "calendar",
    "class times",
    "when are classes",
];

/// Title markers for persona/guidance entries that should ride along with
/// almost any query.
const META_MARKERS: &[&str] = &["bot_personality", "bot_purpose", "guidelines"];

/// Content phrase that marks the canonical calendar-redirect entry.
const CALENDAR_REDIRECT_PHRASE: &str = "direct students to the online class calendar";

const META_BOOST: i32 = 10;
const CALENDAR_BOOST: i32 = 20;
const EVENT_PENALTY: i32 = -5;

/// Selects at most `limit` entries relevant to `query`, ordered by descending
/// score with ties preserving the input order.
pub fn select(entries: &[KnowledgeEntry], query: &str, limit: usize) -> Vec<KnowledgeEntry> {
    let query_lower = query.to_lowercase();
    let schedule_query = SCHEDULE_MARKERS.iter().any(|m| query_lower.contains(m));

    let mut scored: Vec<(i32, &KnowledgeEntry)> = entries
        .iter()
        .filter(|entry| qualifies(entry, &query_lower))
        .map(|entry| (score(entry, &query_lower, schedule_query), entry))
        .collect();

    // sort_by is stable, so equal scores keep their encounter order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, entry)| entry.clone())
        .collect()
}

/// The qualification predicate: a tag appears in the query, or the query
/// appears verbatim inside the content or the title. Deliberately tests the
/// query as a substring of the content, not the reverse.
fn qualifies(entry: &KnowledgeEntry, query_lower: &str) -> bool {
    entry
        .tags
        .iter()
        .any(|tag| query_lower.contains(&tag.to_lowercase()))
        || entry.content.to_lowercase().contains(query_lower)
        || entry.title.to_lowercase().contains(query_lower)
}

fn score(entry: &KnowledgeEntry, _query_lower: &str, schedule_query: bool) -> i32 {
    let mut score = entry.priority;

    let title_lower = entry.title.to_lowercase();
    if META_MARKERS.iter().any(|m| title_lower.contains(m)) {
        score += META_BOOST;
    }

    if schedule_query {
        let content_lower = entry.content.to_lowercase();
        if content_lower.contains(CALENDAR_REDIRECT_PHRASE) {
            score += CALENDAR_BOOST;
        }
        if content_lower.contains("retreat") || content_lower.contains("workshop") {
            score += EVENT_PENALTY;
        }
    }

    score
}
