//! Corpus loading.
//!
//! A knowledge file is either a ready-made list of entries or an arbitrarily
//! nested record that gets flattened heuristically. Each accepted shape is one
//! variant of [`Document`]; both normalize to a flat `Vec<KnowledgeEntry>`.
//! A malformed file is skipped with a warning, never fatal.

use super::KnowledgeEntry;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Keyword vocabulary used to derive tags from entry text.
const TAG_VOCABULARY: &[&str] = &[
    "pricing",
    "classes",
    "schedule",
    "schedules",
    "timetable",
    "timetables",
    "calendar",
    "calendars",
    "booking",
    "beginner",
    "studio",
    "location",
    "address",
    "hours",
    "pass",
    "passes",
    "membership",
    "memberships",
    "injury",
    "equipment",
    "refund",
    "prenatal",
    "therapy",
    "suspension",
    "iyengar",
    "yoga",
    "contact",
    "about",
    "faq",
    "workshop",
    "training",
    "teacher",
    "cost",
    "price",
    "casual",
    "unlimited",
    "pack",
    "weekly",
    "monthly",
    "yearly",
    "online",
    "in-studio",
    "seniors",
    "students",
    "cash",
    "eftpos",
    "credit",
    "debit",
    "guidelines",
    "personality",
    "purpose",
    "direct",
    "class times",
    "when are classes",
];

/// Leaf keys whose array items each deserve their own higher-priority entry.
const EMPHASIZED_LIST_KEYS: &[&str] = &["guidelines", "purpose", "tone", "style"];

/// Keys whose nested records hold pricing data and get the special rendering.
const PRICING_KEYS: &[&str] = &["passes_and_prices", "price"];

/// Default priority assigned to root-level leaves.
const ROOT_PRIORITY: i32 = 5;

/// The two document shapes the loader accepts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Document {
    /// An array that may already be a list of valid entries.
    Entries(Vec<Value>),
    /// A nested record that needs flattening.
    Record(Map<String, Value>),
}

/// Walks `dir` recursively and parses every `.json` file found.
pub fn load_dir(dir: &Path) -> Vec<KnowledgeEntry> {
    let mut entries = Vec::new();
    walk(dir, &mut entries);
    entries
}

fn walk(dir: &Path, out: &mut Vec<KnowledgeEntry>) {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("Failed to read knowledge directory {:?}: {}", dir, e);
            return;
        }
    };

    // Sort for a deterministic encounter order; tie-breaks in the relevance
    // scorer depend on it.
    let mut paths: Vec<_> = read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            walk(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.extend(load_file(&path));
        }
    }
}

/// Parses one corpus file into zero or more entries.
pub fn load_file(path: &Path) -> Vec<KnowledgeEntry> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let document: Document = match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to parse {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let entries = parse_document(document);
    debug!("Loaded {} sections from {:?}", entries.len(), path);
    entries
}

/// Normalizes a parsed document into entries.
pub fn parse_document(document: Document) -> Vec<KnowledgeEntry> {
    match document {
        Document::Entries(items) => items.iter().filter_map(entry_from_value).collect(),
        Document::Record(map) => {
            let mut entries = Vec::new();
            flatten_record(&map, "", ROOT_PRIORITY, &mut entries);
            entries
        }
    }
}

/// Validates one item of an entry-list document: all four fields present with
/// the right types, tags all strings.
fn entry_from_value(value: &Value) -> Option<KnowledgeEntry> {
    let obj = value.as_object()?;
    let title = obj.get("title")?.as_str()?;
    let content = obj.get("content")?.as_str()?;
    let tags = obj
        .get("tags")?
        .as_array()?
        .iter()
        .map(|t| t.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let priority = obj.get("priority")?.as_i64()? as i32;

    Some(KnowledgeEntry {
        title: title.to_string(),
        content: content.to_string(),
        tags,
        priority,
    })
}

/// Flattens a nested record into entries, depth lowering the priority.
fn flatten_record(map: &Map<String, Value>, prefix: &str, priority: i32, out: &mut Vec<KnowledgeEntry>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{} - {}", prefix, key)
        };

        match value {
            Value::String(text) => {
                out.push(make_entry(&path, text, priority));
            }
            Value::Array(items) => {
                if items.iter().all(|i| i.is_string()) {
                    let content = items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .map(|i| format!("• {}", i))
                        .collect::<Vec<_>>()
                        .join("\n");
                    out.push(make_entry(&path, &content, priority));

                    // Personality/style guidance also gets one entry per item
                    // so single lines can outrank whole blocks.
                    if EMPHASIZED_LIST_KEYS.contains(&key.as_str()) {
                        for (index, item) in items.iter().filter_map(|i| i.as_str()).enumerate() {
                            out.push(KnowledgeEntry {
                                title: format!("{} - {}", path, index + 1),
                                content: item.to_string(),
                                tags: extract_tags(item, item),
                                priority: priority + 2,
                            });
                        }
                    }
                } else {
                    for (index, item) in items.iter().enumerate() {
                        if let Value::Object(inner) = item {
                            flatten_record(inner, &format!("{} {}", path, index + 1), priority - 1, out);
                        }
                    }
                }
            }
            Value::Object(inner) => {
                if PRICING_KEYS.contains(&key.as_str()) {
                    pricing_entries(inner, &path, priority, out);
                } else {
                    flatten_record(inner, &path, priority - 1, out);
                }
            }
            _ => {}
        }
    }
}

/// Synthesizes a human-readable price/details/notes block per named item.
fn pricing_entries(pricing: &Map<String, Value>, prefix: &str, priority: i32, out: &mut Vec<KnowledgeEntry>) {
    for (item_name, item_data) in pricing {
        let Some(data) = item_data.as_object() else {
            continue;
        };

        let mut content = String::new();

        match data.get("price") {
            Some(Value::String(price)) => content.push_str(&format!("Price: {}", price)),
            Some(Value::Object(methods)) => {
                let details = methods
                    .iter()
                    .map(|(method, amount)| format!("{}: {}", method, render_scalar(amount)))
                    .collect::<Vec<_>>()
                    .join(", ");
                content.push_str(&format!("Price: {}", details));
            }
            _ => {}
        }

        match data.get("details") {
            Some(Value::String(details)) => {
                content.push_str(&format!("\n\nDetails: {}", details));
            }
            Some(Value::Array(items)) => {
                let bullets = items
                    .iter()
                    .map(|d| format!("• {}", render_scalar(d)))
                    .collect::<Vec<_>>()
                    .join("\n");
                content.push_str(&format!("\n\nDetails:\n{}", bullets));
            }
            _ => {}
        }

        if let Some(Value::String(description)) = data.get("description") {
            content = format!("{}\n\n{}", description, content);
        }

        if let Some(Value::String(notes)) = data.get("notes") {
            content.push_str(&format!("\n\nNotes: {}", notes));
        }

        let content = content.trim().to_string();
        if !content.is_empty() {
            out.push(KnowledgeEntry {
                title: format!("{} - {}", prefix, item_name),
                tags: extract_tags(item_name, &content),
                content,
                priority: priority + 1,
            });
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn make_entry(title: &str, content: &str, priority: i32) -> KnowledgeEntry {
    KnowledgeEntry {
        title: title.to_string(),
        content: content.to_string(),
        tags: extract_tags(title, content),
        priority,
    }
}

/// Derives tags by testing the fixed vocabulary against the lowercased text.
pub fn extract_tags(title: &str, content: &str) -> Vec<String> {
    let text = format!("{} {}", title, content).to_lowercase();
    TAG_VOCABULARY
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}
