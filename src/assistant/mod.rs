//! Client-side reply pipeline: a cached, retrying, cancellable
//! [`ResponseController`] and the [`ChatSession`] message state machine it
//! drives.

pub mod cache;
pub mod controller;
pub mod session;
pub mod transport;

pub use cache::{cache_key, CacheEntry, CacheStats, ResponseCache};
pub use controller::{ResponseController, StreamCallbacks};
pub use session::{ChatSession, NoopObserver, Notice, SessionObserver};
pub use transport::{AskTransport, HttpTransport};
