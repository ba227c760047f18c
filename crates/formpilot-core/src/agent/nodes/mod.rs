//! Graph nodes.
//!
//! Each node is a transition over the turn state returning a partial
//! [`crate::agent::state::StateUpdate`]. Only `extraction` and
//! `conversation` perform I/O: extraction makes one unguarded LLM call,
//! conversation runs the guarded retry exchange. Everything else is pure.

pub mod conversation;
pub mod extraction;
pub mod finalize;
pub mod greeting;
pub mod step_confirmation;
pub mod tool_handler;
pub mod validation;
