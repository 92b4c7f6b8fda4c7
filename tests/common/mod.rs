#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ai_assistant::assistant::{Notice, SessionObserver};
use ai_assistant::{AskError, AskTransport, Message, StreamCallbacks};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Transport that replays canned replies, optionally after a delay.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, AskError>>>,
    fallback: Result<String, AskError>,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::build(Vec::new(), Ok(text.to_string()), Duration::ZERO)
    }

    pub fn failing(error: AskError) -> Arc<Self> {
        Self::build(Vec::new(), Err(error), Duration::ZERO)
    }

    pub fn script(replies: Vec<Result<String, AskError>>) -> Arc<Self> {
        Self::build(replies, Err(AskError::transient("script exhausted")), Duration::ZERO)
    }

    pub fn slow(text: &str, latency: Duration) -> Arc<Self> {
        Self::build(Vec::new(), Ok(text.to_string()), latency)
    }

    fn build(replies: Vec<Result<String, AskError>>, fallback: Result<String, AskError>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            latency,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AskTransport for ScriptedTransport {
    async fn ask(&self, _prompt: &str) -> Result<String, AskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Data(String),
    Error(AskError),
    Complete,
    Retry(u32),
}

/// Records every callback of one `send` in order.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Data(chunk) => Some(chunk),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl StreamCallbacks for Recorder {
    fn on_data(&self, chunk: &str) {
        self.events.lock().push(Event::Data(chunk.to_string()));
    }

    fn on_error(&self, error: AskError) {
        self.events.lock().push(Event::Error(error));
    }

    fn on_complete(&self) {
        self.events.lock().push(Event::Complete);
    }

    fn on_retry(&self, attempt: u32) {
        self.events.lock().push(Event::Retry(attempt));
    }
}

/// Captures what a render layer and toast channel would see.
#[derive(Default)]
pub struct CapturingObserver {
    pub renders: Mutex<Vec<Vec<Message>>>,
    pub notices: Mutex<Vec<Notice>>,
}

impl CapturingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().len()
    }
}

impl SessionObserver for CapturingObserver {
    fn messages_changed(&self, messages: &[Message]) {
        self.renders.lock().push(messages.to_vec());
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Lets paused virtual time run far enough for any pending work to settle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(60)).await;
}
