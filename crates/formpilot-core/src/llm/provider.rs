//! LlmProvider trait definition.
//!
//! Uses RPITIT for `complete` (Rust 2024 edition); the object-safe
//! variant lives in [`super::box_provider`].

use formpilot_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends.
///
/// One call, one whole response. The provider applies its own call-level
/// timeout; it never retries -- corrective retries are the guards' job.
/// Implementations must be safe for concurrent calls across sessions.
///
/// Implementations live in formpilot-infra (e.g. `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai-compatible").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
