//! In-memory session store.
//!
//! Maps opaque conversation ids to live sessions. The store lock (a
//! `DashMap` shard lock) is held only for lookup/insert/delete; each
//! session carries its own `tokio::Mutex` so turns for the same
//! conversation serialize while different sessions run in parallel.
//! Idle sessions expire by last access (default TTL 30 minutes).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use formpilot_types::error::FormError;
use formpilot_types::session::SessionState;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::form::parse_form_definition;

/// Default idle expiry: 30 minutes.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// A live session: the per-conversation state behind its turn lock.
pub struct SessionEntry {
    pub id: String,
    /// Per-session turn lock. A turn holds this for its whole duration,
    /// so no two turns for one conversation ever interleave.
    pub state: Mutex<SessionState>,
    created_at: DateTime<Utc>,
    /// Unix seconds of the last access, readable without the state lock
    /// so the expiry sweep never blocks behind a running turn.
    last_accessed: AtomicI64,
}

impl SessionEntry {
    fn new(id: String, state: SessionState) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: Mutex::new(state),
            created_at: now,
            last_accessed: AtomicI64::new(now.timestamp()),
        }
    }

    /// Record an access.
    pub fn touch(&self) {
        self.last_accessed.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        let last = self.last_accessed.load(Ordering::Relaxed);
        Utc::now().timestamp() - last > ttl.as_secs() as i64
    }
}

/// Keyed map of live sessions with expiry by last access.
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Create a session for a form definition, parsing the markdown once
    /// to populate the required-field and type metadata.
    ///
    /// A caller-supplied id is honored (overwriting any previous session
    /// under that id); otherwise a fresh UUID is generated.
    pub fn create(
        &self,
        form_context_md: &str,
        conversation_id: Option<String>,
    ) -> Result<(String, Arc<SessionEntry>), FormError> {
        if form_context_md.trim().is_empty() {
            return Err(FormError::EmptyContext);
        }

        let id = conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let definition = parse_form_definition(form_context_md);
        let state = SessionState::new(form_context_md.to_string(), &definition);

        info!(
            conversation_id = %id,
            required_fields = state.required_fields.len(),
            title = %definition.title,
            "created session"
        );

        let entry = Arc::new(SessionEntry::new(id.clone(), state));
        self.sessions.insert(id.clone(), entry.clone());
        Ok((id, entry))
    }

    /// Look up a session; expired sessions are removed and reported as
    /// absent. A hit refreshes the access timestamp.
    pub fn get(&self, conversation_id: &str) -> Option<Arc<SessionEntry>> {
        let entry = self.sessions.get(conversation_id)?.clone();
        if entry.is_expired(self.ttl) {
            drop(self.sessions.remove(conversation_id));
            debug!(conversation_id, "session expired on access");
            return None;
        }
        entry.touch();
        Some(entry)
    }

    /// Delete a session. Returns whether it existed.
    pub fn delete(&self, conversation_id: &str) -> bool {
        self.sessions.remove(conversation_id).is_some()
    }

    /// Remove every expired session; returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = before - self.sessions.len();
        if removed > 0 {
            info!(removed, "swept expired sessions");
        }
        removed
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = "\
---
title: Leave Request
fields:
  - id: leave_type
    type: dropdown
    required: true
---
# Leave Request
";

    #[tokio::test]
    async fn test_create_parses_form_once() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        let (id, entry) = store.create(FORM, None).unwrap();
        assert!(!id.is_empty());
        let state = entry.state.lock().await;
        assert_eq!(state.required_fields, vec!["leave_type"]);
    }

    #[tokio::test]
    async fn test_empty_context_rejected() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        assert!(matches!(store.create("  ", None), Err(FormError::EmptyContext)));
    }

    #[tokio::test]
    async fn test_get_returns_same_session() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        let (id, _) = store.create(FORM, None).unwrap();
        let entry = store.get(&id).unwrap();
        assert_eq!(entry.id, id);
        assert!(store.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_custom_conversation_id() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        let (id, _) = store.create(FORM, Some("my-id".to_string())).unwrap();
        assert_eq!(id, "my-id");
        assert!(store.get("my-id").is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        let (id, _) = store.create(FORM, None).unwrap();
        assert!(store.delete(&id));
        assert!(!store.delete(&id));
        assert!(store.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_expired_session_dropped_on_access() {
        let store = SessionStore::new(Duration::from_secs(0));
        let (id, entry) = store.create(FORM, None).unwrap();
        // Backdate the access stamp past the zero TTL.
        entry.last_accessed.store(Utc::now().timestamp() - 10, Ordering::Relaxed);
        assert!(store.get(&id).is_none());
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (_, fresh) = store.create(FORM, Some("fresh".to_string())).unwrap();
        let (_, stale) = store.create(FORM, Some("stale".to_string())).unwrap();
        stale
            .last_accessed
            .store(Utc::now().timestamp() - 3600, Ordering::Relaxed);

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.count(), 1);
        assert!(store.get("fresh").is_some());
        drop(fresh);
    }

    #[tokio::test]
    async fn test_reset_then_recreate_equals_fresh_session() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        let (id, entry) = store.create(FORM, Some("s1".to_string())).unwrap();

        // Simulate conversation progress, then reset.
        {
            let mut state = entry.state.lock().await;
            state.answers.insert("leave_type".to_string(), "Annual".into());
            state.initial_extraction_done = true;
        }
        assert!(store.delete(&id));

        let (_, recreated) = store.create(FORM, Some("s1".to_string())).unwrap();
        let state = recreated.state.lock().await;
        assert!(state.answers.is_empty());
        assert!(!state.initial_extraction_done);
        assert!(state.conversation_history.is_empty());
        assert_eq!(state.required_fields, vec!["leave_type"]);
    }

    #[tokio::test]
    async fn test_turns_serialize_per_session() {
        let store = SessionStore::new(DEFAULT_SESSION_TTL);
        let (_, entry) = store.create(FORM, None).unwrap();

        // Hold the turn lock; a second turn for the same session must wait.
        let guard = entry.state.lock().await;
        assert!(entry.state.try_lock().is_err());
        drop(guard);
        assert!(entry.state.try_lock().is_ok());
    }
}
