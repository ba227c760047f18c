//! LLM provider abstraction.
//!
//! The provider trait is the single seam between the orchestrator and the
//! outside world. Retries do not live here -- the output guards own them.

pub mod box_provider;
pub mod provider;

pub use box_provider::BoxLlmProvider;
pub use provider::LlmProvider;
