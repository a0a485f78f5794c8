//! Intent classification using keyword tables.
//!
//! Pure case-insensitive substring containment — no tokenization, no
//! stemming, no ML model. The tables are data, not control flow, so they stay
//! independently testable and can be swapped for an embedding-based
//! classifier later without touching the callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detected intent type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Costs, passes, memberships, fees.
    Pricing,
    /// Where the studio is, directions.
    Location,
    /// The guided class-recommendation flow.
    ClassSelection,
    /// Everything else — answered from the knowledge base via the generator.
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    /// Returns a human-readable label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Pricing => "pricing",
            Intent::Location => "location",
            Intent::ClassSelection => "class_selection",
            Intent::General => "general",
        }
    }
}

/// Markers for pricing questions.
const PRICING_MARKERS: &[&str] = &[
    "cost",
    "price",
    "how much",
    "pricing",
    "membership",
    "pass",
    "fee",
];

/// Markers for location questions.
const LOCATION_MARKERS: &[&str] = &[
    "location",
    "address",
    "where",
    "studio",
    "directions",
];

/// Markers that, combined with the word "class", start the selection flow.
const CLASS_QUALIFIERS: &[&str] = &[
    "find",
    "help",
    "recommend",
    "which",
    "what",
    "start",
    "beginner",
    "new",
];

/// Whole phrases that start the selection flow on their own.
const CLASS_PHRASES: &[&str] = &[
    "help me find",
    "looking for",
    "want to start",
    "recommend a class",
    "which class should",
    "what class is best",
];

/// Keyword intent classifier. First match wins, order fixed:
/// pricing, then location, then class selection, then general.
#[derive(Debug, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify the intent of an utterance.
    pub fn classify(&self, utterance: &str) -> Intent {
        let text = utterance.to_lowercase();

        if contains_any(&text, PRICING_MARKERS) {
            return Intent::Pricing;
        }

        if contains_any(&text, LOCATION_MARKERS) {
            return Intent::Location;
        }

        let class_with_qualifier = text.contains("class") && contains_any(&text, CLASS_QUALIFIERS);
        if class_with_qualifier || contains_any(&text, CLASS_PHRASES) {
            return Intent::ClassSelection;
        }

        Intent::General
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_detection() {
        let classifier = QueryClassifier::new();

        assert_eq!(
            classifier.classify("How much does a pass cost?"),
            Intent::Pricing
        );
        assert_eq!(classifier.classify("what are your FEES"), Intent::Pricing);
        assert_eq!(
            classifier.classify("tell me about memberships"),
            Intent::Pricing
        );
    }

    #[test]
    fn test_location_detection() {
        let classifier = QueryClassifier::new();

        assert_eq!(classifier.classify("Where is the studio?"), Intent::Location);
        assert_eq!(
            classifier.classify("can I get directions please"),
            Intent::Location
        );
    }

    #[test]
    fn test_class_selection_detection() {
        let classifier = QueryClassifier::new();

        assert_eq!(
            classifier.classify("I'm new, help me find a class"),
            Intent::ClassSelection
        );
        assert_eq!(
            classifier.classify("recommend a class"),
            Intent::ClassSelection
        );
        assert_eq!(
            classifier.classify("which class should I take"),
            Intent::ClassSelection
        );
    }

    #[test]
    fn test_general_fallback() {
        let classifier = QueryClassifier::new();

        assert_eq!(classifier.classify("What's the weather?"), Intent::General);
        assert_eq!(classifier.classify(""), Intent::General);
    }

    #[test]
    fn test_order_is_fixed_pricing_first() {
        let classifier = QueryClassifier::new();

        // Mentions both a pricing and a location marker; pricing is checked first.
        assert_eq!(
            classifier.classify("how much is parking at your location"),
            Intent::Pricing
        );
        // "where" appears before any class phrase can match.
        assert_eq!(
            classifier.classify("where do I start with classes"),
            Intent::Location
        );
    }

    #[test]
    fn test_class_word_alone_is_not_enough() {
        let classifier = QueryClassifier::new();

        // "class" without a qualifier or phrase stays general.
        assert_eq!(classifier.classify("class etiquette rules"), Intent::General);
    }
}
