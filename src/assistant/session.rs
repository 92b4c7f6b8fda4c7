use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::assistant::controller::{ResponseController, StreamCallbacks};
use crate::config::StreamOptions;
use crate::errors::{AskError, SessionError};
use crate::models::{Message, MessageRole, MessageStatus};

/// Transient, non-message feedback for the UI (toasts and the like).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Retrying { attempt: u32, max_attempts: u32 },
    Error(String),
    /// Any notice currently shown can go away.
    Dismiss,
}

/// Render-side collaborator. Both hooks may run on the controller's task with
/// internal locks held; implementations must not call back into the session.
pub trait SessionObserver: Send + Sync + 'static {
    fn messages_changed(&self, _messages: &[Message]) {}
    fn notify(&self, _notice: Notice) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[derive(Clone)]
struct Transcript {
    messages: Arc<Mutex<Vec<Message>>>,
    observer: Arc<dyn SessionObserver>,
}

impl Transcript {
    /// Applies `f` to message `id` if it is still in progress.
    fn update_in_progress(&self, id: &str, f: impl FnOnce(&mut Message)) -> bool {
        let mut messages = self.messages.lock();
        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if !message.status.is_in_progress() {
            return false;
        }
        f(message);
        self.observer.messages_changed(&messages);
        true
    }
}

/// Feeds one assistant message from controller callbacks.
struct AssistantSink {
    transcript: Transcript,
    message_id: String,
    max_attempts: u32,
}

impl StreamCallbacks for AssistantSink {
    fn on_data(&self, chunk: &str) {
        self.transcript.update_in_progress(&self.message_id, |m| {
            m.content.push_str(chunk);
            m.status = MessageStatus::Streaming;
        });
    }

    fn on_error(&self, error: AskError) {
        let note = error.to_string();
        self.transcript.update_in_progress(&self.message_id, |m| {
            if !m.content.is_empty() && !m.content.ends_with("\n\n") {
                m.content.push_str("\n\n");
            }
            m.content.push_str("Error: ");
            m.content.push_str(&note);
            m.status = MessageStatus::Errored;
        });
        self.transcript.observer.notify(Notice::Error(note));
    }

    fn on_complete(&self) {
        self.transcript.update_in_progress(&self.message_id, |m| {
            m.status = MessageStatus::Complete;
        });
        self.transcript.observer.notify(Notice::Dismiss);
    }

    fn on_retry(&self, attempt: u32) {
        self.transcript.observer.notify(Notice::Retrying {
            attempt,
            max_attempts: self.max_attempts,
        });
    }
}

/// Ordered chat transcript driven by a [`ResponseController`].
///
/// The session is the only writer of its messages. User messages are final on
/// creation; each is followed by the assistant message answering it.
pub struct ChatSession {
    controller: Arc<ResponseController>,
    options: StreamOptions,
    transcript: Transcript,
}

impl ChatSession {
    pub fn new(controller: Arc<ResponseController>) -> Self {
        Self::with_observer(controller, Arc::new(NoopObserver))
    }

    pub fn with_observer(controller: Arc<ResponseController>, observer: Arc<dyn SessionObserver>) -> Self {
        let options = controller.config().stream;
        Self {
            controller,
            options,
            transcript: Transcript { messages: Arc::new(Mutex::new(Vec::new())), observer },
        }
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript.messages.lock().clone()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.transcript.messages.lock().iter().find(|m| m.id == id).cloned()
    }

    /// Whether an assistant reply is still being produced.
    pub fn is_busy(&self) -> bool {
        self.transcript
            .messages
            .lock()
            .iter()
            .any(|m| m.role == MessageRole::Assistant && m.status.is_in_progress())
    }

    /// Appends the user turn and its assistant placeholder, then starts the
    /// reply. Blank prompts are ignored. Returns the assistant message id.
    pub fn submit(&self, prompt: &str) -> Option<String> {
        if prompt.trim().is_empty() {
            debug!("Ignoring blank prompt");
            return None;
        }
        self.stop_in_progress();

        let assistant = Message::assistant_placeholder();
        let assistant_id = assistant.id.clone();
        {
            let mut messages = self.transcript.messages.lock();
            messages.push(Message::user(prompt.to_string()));
            messages.push(assistant);
            self.transcript.observer.messages_changed(&messages);
        }

        info!("Submitting prompt ({} chars)", prompt.chars().count());
        self.dispatch(prompt, &assistant_id, |_| {});
        Some(assistant_id)
    }

    /// Stops the running reply, keeping whatever content already arrived.
    pub fn cancel(&self) {
        if self.stop_in_progress() {
            info!("Reply cancelled");
        }
    }

    /// Re-asks the prompt behind an errored assistant message. The message
    /// keeps its content (including earlier error notes) and grows from there.
    pub fn retry(&self, message_id: &str) -> Result<(), SessionError> {
        let prompt = {
            let messages = self.transcript.messages.lock();
            let idx = messages
                .iter()
                .position(|m| m.id == message_id)
                .ok_or_else(|| SessionError::MessageNotFound { id: message_id.to_string() })?;
            let status = messages[idx].status;
            if status != MessageStatus::Errored {
                return Err(SessionError::NotRetryable { id: message_id.to_string(), status });
            }
            messages[..idx]
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .map(|m| m.content.clone())
                .ok_or_else(|| SessionError::MessageNotFound { id: message_id.to_string() })?
        };

        self.stop_in_progress();
        {
            let mut messages = self.transcript.messages.lock();
            if let Some(m) = messages.iter_mut().find(|m| m.id == message_id) {
                m.retry_count += 1;
                m.status = MessageStatus::Pending;
                info!("Retrying message {message_id} (retry #{})", m.retry_count);
            }
        }

        self.dispatch(&prompt, message_id, |m| {
            if !m.content.is_empty() {
                m.content.push_str("\n\n");
            }
        });
        Ok(())
    }

    /// Moves the message to `Streaming` and hands it to the controller.
    fn dispatch(&self, prompt: &str, message_id: &str, prepare: impl FnOnce(&mut Message)) {
        self.transcript.update_in_progress(message_id, |m| {
            prepare(m);
            m.status = MessageStatus::Streaming;
        });
        let sink = AssistantSink {
            transcript: self.transcript.clone(),
            message_id: message_id.to_string(),
            max_attempts: self.options.attempts(),
        };
        self.controller.send(prompt, Arc::new(sink), self.options);
    }

    /// Cancels the controller and finalizes any in-progress assistant message
    /// as `Complete`. Returns whether one was found.
    fn stop_in_progress(&self) -> bool {
        self.controller.cancel();

        let mut messages = self.transcript.messages.lock();
        let mut stopped = false;
        for m in messages.iter_mut() {
            if m.role == MessageRole::Assistant && m.status.is_in_progress() {
                m.status = MessageStatus::Complete;
                stopped = true;
            }
        }
        if stopped {
            self.transcript.observer.messages_changed(&messages);
            drop(messages);
            self.transcript.observer.notify(Notice::Dismiss);
        }
        stopped
    }
}
