use crate::actors::messages::AppError;
use crate::models::ChatTurn;
use async_trait::async_trait;

/// Defines the public interface for a text-generation actor.
///
/// This trait abstracts the specific backend (a remote OpenAI-compatible API
/// in production, a canned mock in tests) so the supervisor never knows which
/// one it is talking to.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    /// Produces one complete reply for the given conversation.
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, AppError>;
}
