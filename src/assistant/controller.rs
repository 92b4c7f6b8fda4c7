use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::assistant::cache::{CacheStats, ResponseCache};
use crate::assistant::transport::AskTransport;
use crate::config::{AssistantConfig, StreamOptions};
use crate::errors::AskError;

/// Receiver of one `send`'s results.
///
/// Callbacks run on the controller's task while it holds its delivery lock,
/// so they must not call back into the same [`ResponseController`].
pub trait StreamCallbacks: Send + Sync + 'static {
    fn on_data(&self, chunk: &str);
    fn on_error(&self, error: AskError);
    fn on_complete(&self);
    /// `attempt` is the number of the attempt about to start (2, 3, ...).
    fn on_retry(&self, _attempt: u32) {}
}

#[derive(Default)]
struct Flight {
    /// Bumped by every `send` and `cancel`; a task whose captured value no
    /// longer matches is stale and must stay silent.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Permission slip for one `send`: callbacks go through it, and it refuses
/// once the flight has moved on.
#[derive(Clone)]
struct Gate {
    flight: Arc<Mutex<Flight>>,
    generation: u64,
}

impl Gate {
    fn emit(&self, f: impl FnOnce()) -> bool {
        let flight = self.flight.lock();
        if flight.generation != self.generation {
            return false;
        }
        f();
        true
    }

    /// Like `emit`, but also releases the in-flight slot.
    fn finish(&self, f: impl FnOnce()) -> bool {
        let mut flight = self.flight.lock();
        if flight.generation != self.generation {
            return false;
        }
        flight.task = None;
        f();
        true
    }
}

/// Single-flight, cancellable, retrying, cached reply pipeline.
///
/// Each instance owns its cache and at most one running request. Starting a
/// new `send` cancels the previous one; dropping the controller cancels too.
pub struct ResponseController {
    transport: Arc<dyn AskTransport>,
    config: AssistantConfig,
    cache: Arc<Mutex<ResponseCache>>,
    flight: Arc<Mutex<Flight>>,
    debounce_ticket: AtomicU64,
}

impl ResponseController {
    pub fn new(transport: Arc<dyn AskTransport>, config: AssistantConfig) -> Self {
        Self {
            transport,
            cache: Arc::new(Mutex::new(ResponseCache::new(config.cache_ttl))),
            config,
            flight: Arc::new(Mutex::new(Flight::default())),
            debounce_ticket: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Starts answering `prompt`, reporting through `callbacks` only.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send(&self, prompt: &str, callbacks: Arc<dyn StreamCallbacks>, options: StreamOptions) {
        let mut flight = self.flight.lock();
        if let Some(previous) = flight.task.take() {
            debug!("Superseding in-flight request");
            previous.abort();
        }
        flight.generation += 1;

        let gate = Gate { flight: Arc::clone(&self.flight), generation: flight.generation };
        let run = Run {
            prompt: prompt.to_string(),
            callbacks,
            options,
            transport: Arc::clone(&self.transport),
            cache: Arc::clone(&self.cache),
            gate,
        };
        flight.task = Some(tokio::spawn(run.execute()));
    }

    /// Aborts the running request and stops chunk delivery. Once this returns,
    /// the cancelled send fires no further callbacks. No-op when idle.
    pub fn cancel(&self) {
        let mut flight = self.flight.lock();
        flight.generation += 1;
        if let Some(task) = flight.task.take() {
            task.abort();
            debug!("Cancelled in-flight request");
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.flight.lock().task.is_some()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Whole reply for `prompt` without chunked delivery, using the default
    /// retry policy. Independent of the single-flight slot.
    pub async fn get_response(&self, prompt: &str) -> Result<String, AskError> {
        let cached = self.cache.lock().get(prompt).map(str::to_owned);
        if let Some(hit) = cached {
            debug!("Cache hit for prompt");
            return Ok(hit);
        }
        let text =
            fetch_with_retry(self.transport.as_ref(), prompt, &self.config.stream, |_| true).await?;
        self.cache.lock().insert(prompt, text.clone());
        Ok(text)
    }

    /// [`get_response`](Self::get_response) after a quiet period. A newer call
    /// made during the wait supersedes this one, which then yields `Aborted`.
    pub async fn debounced_get_response(&self, prompt: &str) -> Result<String, AskError> {
        let ticket = self.debounce_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        sleep(self.config.debounce_delay).await;
        if self.debounce_ticket.load(Ordering::SeqCst) != ticket {
            return Err(AskError::Aborted);
        }
        self.get_response(prompt).await
    }
}

impl Drop for ResponseController {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Everything one spawned `send` needs.
struct Run {
    prompt: String,
    callbacks: Arc<dyn StreamCallbacks>,
    options: StreamOptions,
    transport: Arc<dyn AskTransport>,
    cache: Arc<Mutex<ResponseCache>>,
    gate: Gate,
}

impl Run {
    async fn execute(self) {
        let cached = self.cache.lock().get(&self.prompt).map(str::to_owned);
        let text = match cached {
            Some(text) => {
                debug!("Cache hit, skipping network");
                text
            }
            None => {
                let callbacks = &self.callbacks;
                let gate = &self.gate;
                let fetched = fetch_with_retry(self.transport.as_ref(), &self.prompt, &self.options, |attempt| {
                    gate.emit(|| callbacks.on_retry(attempt))
                })
                .await;
                match fetched {
                    Ok(text) => {
                        self.cache.lock().insert(&self.prompt, text.clone());
                        text
                    }
                    Err(AskError::Aborted) => {
                        debug!("Request was aborted");
                        self.gate.finish(|| {});
                        return;
                    }
                    Err(err) => {
                        warn!("AI request failed: {err}");
                        self.gate.finish(|| callbacks.on_error(err));
                        return;
                    }
                }
            }
        };

        self.deliver(&text).await;
    }

    /// Feeds `text` to `on_data` one chunk per timer tick, then completes on
    /// the tick after the last chunk.
    async fn deliver(&self, text: &str) {
        // interval() rejects a zero period.
        let period = self.options.chunk_delay.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let chunk_chars = self.options.chunk_chars();
        let mut rest = text;
        loop {
            ticker.tick().await;
            if rest.is_empty() {
                if self.gate.finish(|| self.callbacks.on_complete()) {
                    info!("Delivered {} chars", text.chars().count());
                }
                return;
            }
            let (chunk, tail) = split_chunk(rest, chunk_chars);
            rest = tail;
            if !self.gate.emit(|| self.callbacks.on_data(chunk)) {
                return;
            }
        }
    }
}

/// Asks `transport` up to `options.attempts()` times.
///
/// Non-retryable errors return at once. Before each further attempt,
/// `on_retry(next_attempt)` runs (returning `false` abandons the loop as
/// `Aborted`) and then the loop waits `retry_delay * failed_attempt`.
async fn fetch_with_retry(
    transport: &dyn AskTransport,
    prompt: &str,
    options: &StreamOptions,
    mut on_retry: impl FnMut(u32) -> bool,
) -> Result<String, AskError> {
    let attempts = options.attempts();
    let mut attempt = 1;
    loop {
        match transport.ask(prompt).await {
            Ok(text) => return Ok(text),
            Err(err) if !err.is_retryable() || attempt >= attempts => return Err(err),
            Err(err) => {
                warn!("Attempt {attempt}/{attempts} failed: {err}");
                if !on_retry(attempt + 1) {
                    return Err(AskError::Aborted);
                }
                sleep(options.retry_delay * attempt).await;
                attempt += 1;
            }
        }
    }
}

/// Splits off the first `max_chars` characters (not bytes) of `text`.
fn split_chunk(text: &str, max_chars: usize) -> (&str, &str) {
    let at = text.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(text.len());
    text.split_at(at)
}
