//! # Brain Module
//!
//! Fast, non-LLM analysis of user input. The classifier runs BEFORE any
//! generator call and decides which path handles the message.

pub mod intent;

pub use intent::{Intent, QueryClassifier};
