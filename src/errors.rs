use thiserror::Error;

use crate::models::MessageStatus;

/// Failure of a single "ask" round-trip, as seen by the response controller.
///
/// Only [`AskError::Transient`] is retried. [`AskError::Aborted`] is produced
/// when a request is cancelled and is never handed to an `on_error` callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AskError {
    #[error("AI service endpoint not found. Please check the API configuration.")]
    NotFound,

    /// The backend answered with its own error message; passed through verbatim.
    #[error("{message}")]
    Service { message: String },

    #[error("Request failed: {message}")]
    Transient { message: String },

    #[error("Invalid response format")]
    InvalidResponse,

    #[error("Request was aborted")]
    Aborted,
}

impl AskError {
    pub fn service(message: impl Into<String>) -> Self {
        AskError::Service { message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        AskError::Transient { message: message.into() }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AskError::Transient { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, AskError::Aborted)
    }
}

/// Rejected chat-session operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Message '{id}' not found")]
    MessageNotFound { id: String },

    #[error("Message '{id}' cannot be retried while {status}")]
    NotRetryable { id: String, status: MessageStatus },
}

/// Backend error for the ask endpoint.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    // ── AI Agent errors ──────────────────────────────────────────────────────
    #[error("AI service unavailable at {host}")]
    AgentUnavailable { host: String },

    #[error("Model '{model_name}' not found")]
    ModelNotFound { model_name: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },

    #[error("Failed to get a valid response from AI")]
    EmptyCompletion,

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyPrompt | AppError::FieldTooLong { .. })
    }

    pub fn is_agent_unavailable(&self) -> bool {
        matches!(self, AppError::AgentUnavailable { .. })
    }
}
