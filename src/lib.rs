pub mod agent;
pub mod assistant;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;

pub use assistant::{AskTransport, ChatSession, HttpTransport, ResponseController, StreamCallbacks};
pub use config::{AssistantConfig, StreamOptions};
pub use errors::{AppError, AskError, SessionError};
pub use models::{Message, MessageRole, MessageStatus};
