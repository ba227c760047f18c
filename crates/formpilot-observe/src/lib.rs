//! Observability setup for FormPilot AI.

pub mod tracing_setup;
