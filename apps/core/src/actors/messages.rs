use crate::models::ChatTurn;
use serde::Serialize;
use tokio::sync::oneshot;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// A generic internal error within an actor, such as a communication
    /// failure between a handle and its runner.
    #[error("Internal system error: {0}")]
    Internal(String),
    /// An error indicating that an actor operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for ActorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ActorError::Timeout(format!("Actor operation timed out: {}", err))
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the generator actor.
#[derive(Debug)]
pub enum GeneratorMessage {
    /// A request for one complete chat completion.
    Complete {
        /// The full ordered conversation, system turn included.
        turns: Vec<ChatTurn>,
        /// A channel to send the final text result back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `SupervisorActor`.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// A request to process a user's message within a session, running the
    /// full classify/flow/retrieve pipeline.
    ProcessUserMessage {
        session_id: String,
        content: String,
        history: Vec<ChatTurn>,
        /// A channel to send the final reply back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
    /// A request to answer without any per-session state: the whole knowledge
    /// base goes into the prompt and nothing is remembered afterwards.
    ProcessEphemeralMessage {
        content: String,
        history: Vec<ChatTurn>,
        responder: oneshot::Sender<Result<String, AppError>>,
    },
    /// A command to shut down the supervisor.
    #[allow(dead_code)]
    Shutdown,
}
