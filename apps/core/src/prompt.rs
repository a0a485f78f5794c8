//! Prompt assembly and reply post-processing.
//!
//! One instruction block — studio persona, guardrails and the rendered
//! knowledge snippets — concatenated with prior turns and the new utterance.
//! The generator's raw output is normalized before it reaches the widget.

use crate::models::ChatTurn;
use regex::Regex;
use std::sync::LazyLock;

pub const STUDIO_NAME: &str = "Marrickville Yoga Centre";
pub const STUDIO_ADDRESS: &str = "Level 1 53 Sydenham Rd, Marrickville NSW, Australia 2204";
pub const BOOKING_URL: &str = "https://marrickvilleyoga.punchpass.com/calendar";
pub const CONTACT_EMAIL: &str = "info@marrickvilleyoga.com.au";

/// The fixed reply used whenever the generator path fails.
pub const FALLBACK_REPLY: &str = "Oops! Something went wrong.";

static NEWLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid regex: newline runs"));
static TRAILING_LINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("Invalid regex: trailing whitespace"));

/// Builds the system instruction block around the supplied knowledge.
pub fn system_prompt(knowledge_block: &str) -> String {
    format!(
        "You are a helpful yoga studio assistant for {name}. Use the following information to answer the user's question.\n\n\
         Relevant Information:\n{knowledge}\n\n\
         IMPORTANT INSTRUCTIONS:\n\
         - When users ask about schedules, timetables, or booking classes, always direct them to our online booking system at {booking}\n\
         - When users ask about location, address, or where the studio is, always provide the complete address: \"{address}\"\n\
         - When users ask about pricing or passes, provide comprehensive information from the knowledge base\n\
         - Always be helpful, accurate, and provide complete information based on what you know\n\
         - Stay strictly on topics related to yoga, {name}, our classes, pricing, schedules, policies, events, instructors, location, and how to get started\n\
         - Politely refuse to answer questions unrelated to yoga or the studio (e.g., politics, coding, medical or legal advice, general trivia)\n\
         - If refusing, keep the refusal brief and redirect to studio-related help\n\
         - Never invent facts about the studio. If unsure, say you're not certain and offer to connect via {email}\n\
         - Always reply in British English\n\n\
         Please provide helpful, accurate responses based on this information. Keep your responses concise and well-formatted.",
        name = STUDIO_NAME,
        knowledge = knowledge_block,
        booking = BOOKING_URL,
        address = STUDIO_ADDRESS,
        email = CONTACT_EMAIL,
    )
}

/// Assembles the full request: instruction block, prior turns, new utterance.
pub fn build_request(utterance: &str, history: &[ChatTurn], knowledge_block: &str) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::system(system_prompt(knowledge_block)));
    turns.extend(history.iter().cloned());
    turns.push(ChatTurn::user(utterance));
    turns
}

/// Normalizes a raw generator reply: collapses 3+ consecutive newlines to 2,
/// strips trailing whitespace per line, trims the whole.
pub fn tidy_reply(raw: &str) -> String {
    let collapsed = NEWLINE_RUNS.replace_all(raw, "\n\n");
    let stripped = TRAILING_LINE_WS.replace_all(&collapsed, "");
    stripped.trim().to_string()
}
