use crate::actors::messages::{ActorError, AppError, GeneratorMessage};
use crate::actors::traits::Generator;
use crate::config::Settings;
use crate::models::ChatTurn;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{info, warn};

/// A handle to the generator actor.
///
/// This struct provides a public, cloneable interface for sending messages to
/// the running generator actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct GeneratorHandle {
    sender: mpsc::Sender<GeneratorMessage>,
    request_timeout: Duration,
}

/// Grace added on top of the per-request timeout before the handle gives up
/// on the actor itself.
const HANDLE_TIMEOUT_GRACE: Duration = Duration::from_secs(15);

impl GeneratorHandle {
    /// Creates a new generator actor and returns a handle to it.
    ///
    /// This will spawn the `GeneratorRunner` in a new Tokio task.
    pub fn new(settings: &Settings) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = GeneratorRunner::new(receiver, settings);
        tokio::spawn(async move { actor.run().await });
        Self {
            sender,
            request_timeout: Duration::from_secs(settings.generator_timeout_secs),
        }
    }

    fn handle_timeout(&self) -> Duration {
        // The runner enforces the request timeout; the grace only guards
        // against a dead actor.
        self.request_timeout + HANDLE_TIMEOUT_GRACE
    }
}

#[async_trait]
impl Generator for GeneratorHandle {
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = GeneratorMessage::Complete {
            turns,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| ActorError::Internal(format!("Generator actor unavailable: {}", e)))?;
        timeout(self.handle_timeout(), recv)
            .await?
            .map_err(|e| ActorError::Internal(format!("Generator actor dropped request: {}", e)))?
    }
}

// --- Actor Runner (Internal Logic) ---
struct GeneratorRunner {
    receiver: mpsc::Receiver<GeneratorMessage>,
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeneratorRunner {
    fn new(receiver: mpsc::Receiver<GeneratorMessage>, settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.generator_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            receiver,
            client,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai_api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        }
    }

    async fn run(mut self) {
        info!("Generator actor started");

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }

        info!("Generator actor stopped");
    }

    async fn handle_message(&self, msg: GeneratorMessage) {
        match msg {
            GeneratorMessage::Complete { turns, responder } => {
                let result = self.generate_completion(turns).await;
                let _ = responder.send(result);
            }
        }
    }

    async fn generate_completion(&self, turns: Vec<ChatTurn>) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "temperature": self.temperature,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = res.status().as_u16();

        if status != 200 {
            let body = res.text().await.unwrap_or_default();
            warn!(status, "Generator returned error: {}", body);
            return Err(AppError::Upstream {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = res
            .json()
            .await
            .map_err(|e| AppError::Upstream {
                status: 200,
                message: format!("Failed to parse response: {}", e),
            })?;

        let reply = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_else(|| "Sorry, I don't know.".to_string());

        Ok(reply)
    }
}

// --- OpenAI-compatible API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(server_url: &str) -> Settings {
        Settings {
            bind_addr: "127.0.0.1:0".to_string(),
            openai_api_key: "sk-test".to_string(),
            openai_base_url: server_url.to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            generator_timeout_secs: 5,
            knowledge_dir: std::path::PathBuf::new(),
            db_path: std::path::PathBuf::new(),
            rate_limit: 15,
            rate_window_secs: 3600,
            upstream_limit: 100,
            upstream_window_secs: 60,
            session_capacity: 16,
            require_session_id: false,
        }
    }

    fn setup_test_actor(server_url: &str) -> GeneratorHandle {
        let (sender, receiver) = mpsc::channel(32);
        let actor = GeneratorRunner::new(receiver, &test_settings(server_url));
        tokio::spawn(async move { actor.run().await });
        GeneratorHandle {
            sender,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_generate_completion_success() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(&mock_server.uri());

        let expected_response = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "This is a test response."}}
            ]
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(expected_response))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.complete(vec![ChatTurn::user("Hello")]).await;

        // 3. Assert
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "This is a test response.");
    }

    #[tokio::test]
    async fn test_generate_completion_server_error() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        // 2. Act
        let result = handle.complete(vec![ChatTurn::user("Hello")]).await;

        // 3. Assert
        match result {
            Err(AppError::Upstream { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("Internal Server Error"));
            }
            other => panic!("Expected AppError::Upstream, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_upstream_rate_limit_surfaces_status() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&mock_server)
            .await;

        let result = handle.complete(vec![ChatTurn::user("Hello")]).await;
        assert!(matches!(
            result,
            Err(AppError::Upstream { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_choices_falls_back_to_canned_reply() {
        let mock_server = MockServer::start().await;
        let handle = setup_test_actor(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&mock_server)
            .await;

        let result = handle.complete(vec![ChatTurn::user("Hello")]).await;
        assert_eq!(result.unwrap(), "Sorry, I don't know.");
    }
}
