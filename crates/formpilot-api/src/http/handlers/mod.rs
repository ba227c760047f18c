//! HTTP request handlers.
//!
//! Endpoints:
//! - POST /api/chat              - process a user message in a conversation
//! - GET  /api/schemas           - list available example schemas (.md files)
//! - GET  /api/schemas/{filename} - get a specific schema file's content
//! - POST /api/sessions/reset    - reset/delete a conversation session
//! - GET  /api/health            - health check

pub mod chat;
pub mod health;
pub mod schema;
pub mod session;
