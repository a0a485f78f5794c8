use crate::actors::llm::GeneratorHandle;
use crate::actors::messages::{ActorError, AppError, SupervisorMessage};
use crate::actors::traits::Generator;
use crate::brain::{Intent, QueryClassifier};
use crate::config::Settings;
use crate::flow;
use crate::flow::ConversationState;
use crate::knowledge::KnowledgeStore;
use crate::models::ChatTurn;
use crate::prompt;
use crate::prompt::{BOOKING_URL, CONTACT_EMAIL, STUDIO_ADDRESS};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument};

/// How many knowledge sections go into a general-intent prompt.
const RELEVANT_SECTION_LIMIT: usize = 8;

/// How long a caller waits for the supervisor before giving up.
const HANDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A handle to the `SupervisorActor`.
///
/// This is the primary entry point for the chat pipeline. The supervisor owns
/// every piece of mutable conversation state and drains its queue one message
/// at a time, so two requests for the same session can never interleave their
/// state mutations.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
}

impl SupervisorHandle {
    /// Creates the production supervisor: a live generator actor plus the
    /// shared knowledge store.
    pub fn new(settings: &Settings, knowledge: Arc<KnowledgeStore>) -> Self {
        let generator = Arc::new(GeneratorHandle::new(settings));
        Self::spawn(generator, knowledge, settings.session_capacity)
    }

    /// Spawns a supervisor over any generator implementation. Used directly
    /// by tests with a mock generator.
    pub(crate) fn spawn<G>(
        generator: Arc<G>,
        knowledge: Arc<KnowledgeStore>,
        session_capacity: usize,
    ) -> Self
    where
        G: Generator,
    {
        let (sender, receiver) = mpsc::channel(32);
        let runner = SupervisorRunner::new(receiver, generator, knowledge, session_capacity);
        tokio::spawn(async move { runner.run().await });
        Self { sender }
    }

    /// Processes a user message within a session: classify, then either a
    /// templated answer, a flow step, or a knowledge-grounded generator call.
    #[instrument(skip(self, content, history))]
    pub async fn process_message(
        &self,
        session_id: String,
        content: String,
        history: Vec<ChatTurn>,
    ) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessUserMessage {
            session_id,
            content,
            history,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Internal(format!("Supervisor unavailable: {}", e)))?;
        timeout(HANDLE_TIMEOUT, recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("Supervisor dropped request: {}", e)))?
    }

    /// Processes a message with no per-session state: the whole knowledge
    /// base goes into the prompt and nothing is remembered afterwards.
    #[instrument(skip(self, content, history))]
    pub async fn process_ephemeral(
        &self,
        content: String,
        history: Vec<ChatTurn>,
    ) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessEphemeralMessage {
            content,
            history,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Internal(format!("Supervisor unavailable: {}", e)))?;
        timeout(HANDLE_TIMEOUT, recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("Supervisor dropped request: {}", e)))?
    }
}

// --- Actor Runner ---
struct SupervisorRunner<G>
where
    G: Generator,
{
    receiver: mpsc::Receiver<SupervisorMessage>,
    generator: Arc<G>,
    knowledge: Arc<KnowledgeStore>,
    classifier: QueryClassifier,
    /// Conversation states, least-recently-used sessions evicted at capacity.
    sessions: LruCache<String, ConversationState>,
}

impl<G> SupervisorRunner<G>
where
    G: Generator,
{
    fn new(
        receiver: mpsc::Receiver<SupervisorMessage>,
        generator: Arc<G>,
        knowledge: Arc<KnowledgeStore>,
        session_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(session_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            receiver,
            generator,
            knowledge,
            classifier: QueryClassifier::new(),
            sessions: LruCache::new(capacity),
        }
    }

    async fn run(mut self) {
        info!("Supervisor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!("Supervisor stopped");
    }

    async fn handle_message(&mut self, msg: SupervisorMessage) {
        match msg {
            SupervisorMessage::ProcessUserMessage {
                session_id,
                content,
                history,
                responder,
            } => {
                let result = self.handle_user_message(&session_id, &content, history).await;
                if let Err(e) = &result {
                    error!("Error processing user message: {:?}", e);
                }
                let _ = responder.send(result);
            }
            SupervisorMessage::ProcessEphemeralMessage {
                content,
                history,
                responder,
            } => {
                let result = self.handle_ephemeral_message(&content, history).await;
                if let Err(e) = &result {
                    error!("Error processing ephemeral message: {:?}", e);
                }
                let _ = responder.send(result);
            }
            SupervisorMessage::Shutdown => {
                info!("Supervisor shutting down...");
            }
        }
    }

    #[instrument(skip(self, content, history))]
    async fn handle_user_message(
        &mut self,
        session_id: &str,
        content: &str,
        history: Vec<ChatTurn>,
    ) -> Result<String, AppError> {
        let intent = self.classifier.classify(content);
        info!(session = %session_id, intent = %intent, "Handling user message");

        // Pricing and location stay templated even mid-flow; the pending flow
        // resumes with the next message.
        match intent {
            Intent::Pricing => return Ok(pricing_reply(&self.knowledge)),
            Intent::Location => return Ok(location_reply()),
            _ => {}
        }

        let state = self
            .sessions
            .get_or_insert_mut(session_id.to_string(), ConversationState::default);

        if intent == Intent::ClassSelection && !state.in_flow() {
            return Ok(flow::start(state));
        }

        if state.in_flow() {
            return Ok(flow::advance(state, content));
        }

        self.general_reply(content, history).await
    }

    async fn handle_ephemeral_message(
        &self,
        content: &str,
        history: Vec<ChatTurn>,
    ) -> Result<String, AppError> {
        let turns = prompt::build_request(content, &history, &self.knowledge.all_content());
        let raw = self.generator.complete(turns).await?;
        Ok(prompt::tidy_reply(&raw))
    }

    /// The general path: retrieve, assemble, generate, tidy.
    async fn general_reply(
        &self,
        content: &str,
        history: Vec<ChatTurn>,
    ) -> Result<String, AppError> {
        let relevant = self
            .knowledge
            .relevant_sections(content, RELEVANT_SECTION_LIMIT);

        let knowledge_block = if relevant.is_empty() {
            self.knowledge.all_content()
        } else {
            relevant
                .iter()
                .map(|section| section.render())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let turns = prompt::build_request(content, &history, &knowledge_block);
        let raw = self.generator.complete(turns).await?;
        Ok(prompt::tidy_reply(&raw))
    }
}

/// Assembles the templated pricing overview from tagged knowledge sections.
fn pricing_reply(knowledge: &KnowledgeStore) -> String {
    let mut sections = knowledge.sections_by_tag("pricing");
    for tag in ["pass", "membership"] {
        for section in knowledge.sections_by_tag(tag) {
            if !sections.iter().any(|s| s.title == section.title) {
                sections.push(section);
            }
        }
    }

    if sections.is_empty() {
        return format!(
            "I don't have current pricing information available. Please contact us at {} \
             for the most up-to-date pricing.",
            CONTACT_EMAIL
        );
    }

    let mut beginner = Vec::new();
    let mut memberships = Vec::new();
    let mut specials = Vec::new();
    let mut regular = Vec::new();

    for section in &sections {
        let title = section.title.to_lowercase();
        let line = format!("• {}: {}\n", section.title, section.content);
        if title.contains("begin") || title.contains("single") {
            beginner.push(line);
        } else if title.contains("membership") || title.contains("weekly") {
            memberships.push(line);
        } else if title.contains("spring") || title.contains("special") {
            specials.push(line);
        } else {
            regular.push(line);
        }
    }

    let mut response = String::from("Here's a comprehensive overview of our passes and pricing:\n\n");
    for (category, lines) in [
        ("Beginner Options", beginner),
        ("Regular Passes", regular),
        ("Memberships", memberships),
        ("Special Offers", specials),
    ] {
        if !lines.is_empty() {
            response.push_str(&format!("**{}**\n", category));
            for line in lines {
                response.push_str(&line);
            }
            response.push('\n');
        }
    }

    response.push_str(&format!(
        "**Book Online**: You can view our full schedule and book classes through our \
         [online booking system]({}).\n\n",
        BOOKING_URL
    ));
    response.push_str(&format!(
        "For any questions about passes or to discuss the best option for you, please \
         contact us at {}",
        CONTACT_EMAIL
    ));

    response
}

/// The fixed location answer.
fn location_reply() -> String {
    format!(
        "Here's our location information:\n\n\
         **Address:** {}\n\n\
         **Nearby:**\n\
         • Marrickville and Sydenham train stations\n\
         • Public transport including the Sydenham metro line\n\
         • Ample free parking\n\n\
         For directions or to contact us, please email {}",
        STUDIO_ADDRESS, CONTACT_EMAIL
    )
}
