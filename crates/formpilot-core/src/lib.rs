//! Conversation orchestrator for FormPilot AI.
//!
//! The core crate holds everything between the HTTP adapter and the LLM
//! provider: form-context parsing, the prompt builders, the per-turn state
//! machine (nodes + graph driver), the output guards with corrective
//! retries, and the in-memory session store.

pub mod agent;
pub mod dates;
pub mod form;
pub mod llm;
pub mod session;
