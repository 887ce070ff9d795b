//! Rust connector for Google's Gemini generative AI API.
//!
//! Wraps the Gemini REST endpoints (single-shot generation, streaming
//! generation, multi-turn chat, model introspection) behind an immutable
//! [`GeminiConfig`] and a deterministic retry/backoff policy.

/// Default API base URL (Gemini REST v1beta).
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// HTTP header name for API key authentication.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

mod chat;
mod client;
mod config;
mod errors;
mod logging;
mod retry;
mod sse;
mod types;
mod validator;
mod wire;

pub use chat::ChatSession;
pub use client::Client;
pub use config::GeminiConfig;
pub use errors::{APIError, Error, Result, TransportError, TransportErrorKind};
pub use logging::init_tracing;
pub use retry::RetryPolicy;
pub use sse::TextStream;
pub use types::{
    CandidateSummary, ChatMessage, ChatResult, ChatRole, GenerationResult, ModelInfo,
    ModelInfoReport, SafetyRating, Usage,
};
pub use validator::{ValidationEntry, ValidationState, Validator};
pub use wire::SafetySetting;
