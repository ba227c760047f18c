//! Infrastructure adapters for FormPilot AI.
//!
//! Concrete implementations of the core crate's seams: the
//! OpenAI-compatible LLM provider and the environment configuration
//! loader.

pub mod config;
pub mod llm;
