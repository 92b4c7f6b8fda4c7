use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CHUNK_SIZE: usize = 15;
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

/// Per-call delivery and retry knobs for [`ResponseController::send`].
///
/// `max_retries` is the total number of attempts; zero still makes one.
///
/// [`ResponseController::send`]: crate::assistant::ResponseController::send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    pub chunk_size: usize,
    #[serde(with = "millis")]
    pub chunk_delay: Duration,
    pub max_retries: u32,
    #[serde(with = "millis")]
    pub retry_delay: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl StreamOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_delay(mut self, chunk_delay: Duration) -> Self {
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub(crate) fn chunk_chars(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Controller-wide settings: default stream options plus cache/debounce timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub stream: StreamOptions,
    #[serde(with = "millis")]
    pub cache_ttl: Duration,
    #[serde(with = "millis")]
    pub debounce_delay: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            stream: StreamOptions::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
        }
    }
}

impl AssistantConfig {
    /// Reads `AI_*` overrides from the environment; absent or unparsable
    /// values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Ignoring {key}={raw:?}: {e}");
                    None
                }
            }
        };
        let millis_or = |key: &str, default: Duration| {
            parse(key).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            stream: StreamOptions {
                chunk_size: parse("AI_CHUNK_SIZE")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.stream.chunk_size),
                chunk_delay: millis_or("AI_CHUNK_DELAY_MS", defaults.stream.chunk_delay),
                max_retries: parse("AI_MAX_RETRIES")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(defaults.stream.max_retries),
                retry_delay: millis_or("AI_RETRY_DELAY_MS", defaults.stream.retry_delay),
            },
            cache_ttl: millis_or("AI_CACHE_TTL_MS", defaults.cache_ttl),
            debounce_delay: millis_or("AI_DEBOUNCE_MS", defaults.debounce_delay),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
