use async_trait::async_trait;
use rig::client::Nothing;
use rig::completion::Chat;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::ollama;
use tracing::error;

use crate::errors::AppError;

pub const DEFAULT_MODEL: &str = "llama3.2";
const PREAMBLE: &str = "You are a helpful personal productivity assistant. \
                        Help the user plan tasks, goals, habits and notes. \
                        Be concise, accurate, and friendly. \
                        If you don't know something, say so.";

/// Answers a single prompt with a complete reply. Backs the ask endpoint.
#[async_trait]
pub trait PromptResponder: Send + Sync + 'static {
    async fn respond(&self, prompt: &str) -> Result<String, AppError>;
}

/// Service that uses the rig [`ollama::Client`] to answer one prompt.
/// Every request is independent: no history is replayed.
#[derive(Clone)]
pub struct OllamaAgentService {
    client: ollama::Client,
    base_url: String,
    model: String,
}

impl OllamaAgentService {
    pub fn new(base_url: &str, model: &str) -> Result<Self, AppError> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| AppError::Unexpected(format!("Failed to build Ollama client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
        })
    }

    fn classify(&self, e: impl std::fmt::Display) -> AppError {
        let msg = e.to_string();
        if msg.contains("Connection refused") || msg.contains("connect") {
            AppError::AgentUnavailable { host: self.base_url.clone() }
        } else if msg.contains("model") {
            AppError::ModelNotFound { model_name: self.model.clone() }
        } else {
            AppError::InferenceError { message: msg }
        }
    }
}

#[async_trait]
impl PromptResponder for OllamaAgentService {
    async fn respond(&self, prompt: &str) -> Result<String, AppError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(PREAMBLE)
            .build();

        let content = agent
            .chat(prompt, Vec::<RigMessage>::new())
            .await
            .map_err(|e| {
                error!("Ollama inference failed: {e}");
                self.classify(e)
            })?;

        if content.trim().is_empty() {
            return Err(AppError::EmptyCompletion);
        }
        Ok(content)
    }
}
