//! POST /api/chat -- the single conversational endpoint.
//!
//! Resumes the session named by `conversation_id` or creates a new one
//! from the provided form markdown, then runs one turn of the graph. The
//! per-session lock is held for the whole turn, so turns for the same
//! conversation serialize while different sessions run freely in
//! parallel. The mutated session commits only after the turn completes;
//! a dropped (cancelled) request leaves the stored state untouched.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use formpilot_core::agent::graph::run_turn;
use formpilot_types::action::Action;
use formpilot_types::session::{ToolResult, TurnInput};

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for the /chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub form_context_md: String,
    pub user_message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub tool_results: Option<Vec<ToolResult>>,
}

/// Response body for the /chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub action: Action,
    pub conversation_id: String,
    pub answers: BTreeMap<String, Value>,
}

#[instrument(skip_all, fields(conversation_id))]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.form_context_md.trim().is_empty() {
        return Err(AppError::BadRequest(
            "form_context_md cannot be empty".to_string(),
        ));
    }

    let Some(llm) = state.llm.clone() else {
        return Err(AppError::Internal(
            "Server not properly configured: no LLM endpoint".to_string(),
        ));
    };

    // Resume the session, or create one (honoring a caller-supplied id).
    let entry = match request
        .conversation_id
        .as_deref()
        .and_then(|id| state.store.get(id))
    {
        Some(entry) => entry,
        None => {
            let (_, entry) = state
                .store
                .create(&request.form_context_md, request.conversation_id.clone())
                .map_err(|err| AppError::BadRequest(err.to_string()))?;
            entry
        }
    };
    let conversation_id = entry.id.clone();
    tracing::Span::current().record("conversation_id", conversation_id.as_str());

    let input = TurnInput {
        user_message: request.user_message,
        tool_results: request.tool_results.unwrap_or_default(),
    };

    // The turn runs on a copy; the lock serializes turns per session and
    // the copy commits only when the turn finished.
    let mut guard = entry.state.lock().await;
    let working = guard.clone();
    let (mut new_state, action) = run_turn(
        &llm,
        &state.config.llm_model_name,
        working,
        input,
        Utc::now().date_naive(),
    )
    .await;
    new_state.last_accessed_at = Utc::now();
    let answers = new_state.answers.clone();
    *guard = new_state;
    drop(guard);
    entry.touch();

    info!(action = action.kind(), "turn completed");

    Ok(Json(ChatResponse {
        action,
        conversation_id,
        answers,
    }))
}
