use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// A full reply memoized under its normalized prompt.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: String,
    pub timestamp: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) < ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Entries held, expired ones included.
    pub entries: usize,
    /// Entries still young enough to answer a lookup.
    pub fresh: usize,
}

/// Trimmed, case-folded prompt; `" Hello "` and `"hello"` share a key.
pub fn cache_key(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Prompt → reply memo with a fixed TTL. Expired entries are skipped on read
/// and overwritten on the next store, never purged in the background.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    pub fn get(&self, prompt: &str) -> Option<&str> {
        let now = Instant::now();
        self.entries
            .get(&cache_key(prompt))
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.response.as_str())
    }

    pub fn insert(&mut self, prompt: &str, response: String) {
        self.entries.insert(
            cache_key(prompt),
            CacheEntry { response, timestamp: Instant::now() },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        CacheStats {
            entries: self.entries.len(),
            fresh: self.entries.values().filter(|e| e.is_fresh(self.ttl, now)).count(),
        }
    }
}
