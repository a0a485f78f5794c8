//! The guided class-selection flow.
//!
//! A small per-session state machine: a fixed sequence of qualifying
//! questions ending in a recommendation and a booking call-to-action. No
//! backtracking; an unrecognized answer re-asks the same question without
//! advancing. The engine only mutates the state it is handed — serializing
//! access per session is the caller's job.

use crate::prompt::{BOOKING_URL, CONTACT_EMAIL};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experience {
    Beginner,
    Experienced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    WithConditions,
    NoConditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeType {
    Therapy,
    Regular,
}

/// The flows this engine knows. There is exactly one today; the enum keeps
/// the state self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    ClassSelection,
}

/// Answers accumulated across steps 1-3. Cleared only by the step-4 reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowResponses {
    pub experience: Option<Experience>,
    pub health: Option<Health>,
    pub practice_type: Option<PracticeType>,
}

/// Per-session conversation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub current_flow: Option<FlowKind>,
    pub step: u8,
    pub responses: FlowResponses,
}

impl ConversationState {
    /// Whether a flow is active for this session.
    pub fn in_flow(&self) -> bool {
        self.current_flow.is_some() && self.step > 0
    }

    fn reset(&mut self) {
        *self = ConversationState::default();
    }
}

const EXPERIENCE_QUESTION: &str = "Hi! I'd love to help you find the perfect yoga class. \
     Are you new to yoga, or do you have some prior experience?";
const EXPERIENCE_REPROMPT: &str = "I didn't quite catch that. \
     Are you new to yoga, or do you have some prior experience?";
const HEALTH_QUESTION: &str =
    "Do you have any injuries or health conditions we should consider?";
const PRACTICE_QUESTION: &str = "What type of practice are you looking for - \
     regular classes, therapy-focused, or something more advanced?";
const PRACTICE_REPROMPT: &str = "I didn't quite understand. What type of practice are you \
     looking for - regular classes, therapy-focused, or something more advanced?";
const FORMAT_QUESTION: &str = "Would you prefer one-on-one guidance or group classes?";
const SETTING_QUESTION: &str =
    "Are you looking for in-studio classes, online classes, or both?";

/// Enters the flow: marks it active and asks the first question. The answer
/// is classified on the next turn, not here.
pub fn start(state: &mut ConversationState) -> String {
    state.current_flow = Some(FlowKind::ClassSelection);
    state.step = 1;
    state.responses = FlowResponses::default();
    EXPERIENCE_QUESTION.to_string()
}

/// Advances the flow one step with the user's latest input and returns the
/// reply to send.
pub fn advance(state: &mut ConversationState, input: &str) -> String {
    let input = input.to_lowercase();

    match state.step {
        1 => answer_experience(state, &input),
        2 => match state.responses.experience {
            Some(Experience::Beginner) => answer_health(state, &input),
            _ => answer_practice_type(state, &input),
        },
        3 => recommend(state, &input),
        4 => close(state, &input),
        _ => {
            // Unreachable with a well-behaved caller; restart cleanly.
            state.reset();
            start(state)
        }
    }
}

fn contains_any(input: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| input.contains(m))
}

fn answer_experience(state: &mut ConversationState, input: &str) -> String {
    if contains_any(input, &["new", "beginner", "no experience"]) {
        state.responses.experience = Some(Experience::Beginner);
        state.step = 2;
        HEALTH_QUESTION.to_string()
    } else if contains_any(input, &["experience", "prior", "yes"]) {
        state.responses.experience = Some(Experience::Experienced);
        state.step = 2;
        PRACTICE_QUESTION.to_string()
    } else {
        EXPERIENCE_REPROMPT.to_string()
    }
}

fn answer_health(state: &mut ConversationState, input: &str) -> String {
    // "no injuries" must not read as an injury report.
    let negated = contains_any(input, &["no ", "none", "nothing", "not really"]);
    state.responses.health =
        if !negated && contains_any(input, &["injury", "health", "condition", "yes"]) {
            Some(Health::WithConditions)
        } else {
            Some(Health::NoConditions)
        };
    state.step = 3;
    FORMAT_QUESTION.to_string()
}

fn answer_practice_type(state: &mut ConversationState, input: &str) -> String {
    if contains_any(input, &["therapy", "therapeutic"]) {
        state.responses.practice_type = Some(PracticeType::Therapy);
        state.step = 3;
        SETTING_QUESTION.to_string()
    } else if contains_any(input, &["advanced", "regular"]) {
        state.responses.practice_type = Some(PracticeType::Regular);
        state.step = 3;
        SETTING_QUESTION.to_string()
    } else {
        PRACTICE_REPROMPT.to_string()
    }
}

/// The fixed decision table keyed on accumulated answers and the keywords of
/// the current input.
fn recommend(state: &mut ConversationState, input: &str) -> String {
    let responses = &state.responses;

    let recommendation = match (responses.experience, responses.health, responses.practice_type) {
        (Some(Experience::Beginner), Some(Health::WithConditions), _) => {
            if contains_any(input, &["one", "personal"]) {
                "Yoga Therapy – Personal (one-on-one sessions)"
            } else {
                "Yoga Therapy – Group classes"
            }
        }
        (Some(Experience::Beginner), _, _) => "Beginning Classes with our 2-Week Unlimited Pass",
        (_, _, Some(PracticeType::Therapy)) => {
            if input.contains("online") {
                "Online Yoga Therapy classes"
            } else {
                "Yoga Therapy – Personal or Group classes"
            }
        }
        _ => {
            if input.contains("online") {
                "Online classes with Content Library access"
            } else {
                "General or Experienced level classes"
            }
        }
    };

    state.step = 4;

    format!(
        "Perfect! Based on what you've told me, I think **{}** would be ideal for you.\n\n\
         Would you like me to help you book this class? You can check our online class \
         calendar and timetables to see available times.",
        recommendation
    )
}

fn close(state: &mut ConversationState, input: &str) -> String {
    let reply = if contains_any(input, &["yes", "book", "sure", "okay"]) {
        format!(
            "Great! You can book your class through our online booking system:\n\n\
             **Book Online:** [{url}]({url})\n\n\
             This will show you all available class times and allow you to reserve your spot. \
             We recommend booking in advance to ensure availability.\n\n\
             If you need help with the booking process or have any questions, feel free to \
             contact us at {email}",
            url = BOOKING_URL,
            email = CONTACT_EMAIL,
        )
    } else {
        "No problem! If you change your mind or have any other questions about our classes, \
         feel free to ask. You can always book later through our online system or contact us \
         directly."
            .to_string()
    };

    state.reset();
    reply
}
