use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a chat message. Assistant messages only move forward
/// (`Pending` → `Streaming` → `Complete` | `Errored`), except that a retry
/// puts an `Errored` message back into `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Errored,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Streaming => "streaming",
            MessageStatus::Complete => "complete",
            MessageStatus::Errored => "errored",
        }
    }

    /// Whether more content or a status change is still expected.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Streaming)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub status: MessageStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// User turns are final the moment they are created.
    pub fn user(content: String) -> Self {
        Self::new(MessageRole::User, content, MessageStatus::Complete)
    }

    /// Empty assistant turn awaiting its reply.
    pub fn assistant_placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new(), MessageStatus::Pending)
    }

    fn new(role: MessageRole, content: String, status: MessageStatus) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            status,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Body of `POST /api/ai/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub prompt: String,
}

/// Successful reply from `POST /api/ai/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub response: Option<String>,
}

/// Error reply from `POST /api/ai/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
