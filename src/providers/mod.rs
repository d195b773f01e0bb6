//! Search provider implementations.
//!
//! [`SearchProvider`] is the seam between the facade and the managed
//! backend. [`GeminiClient`] talks to the real API, [`MemoryProvider`]
//! serves offline mode, and [`RetryingSearchProvider`] adds backoff to
//! either.

pub mod gemini;
pub mod memory;
pub mod retry;
pub mod traits;

pub use gemini::GeminiClient;
pub use memory::MemoryProvider;
pub use retry::{RetryConfig, RetryingSearchProvider};
pub use traits::SearchProvider;
