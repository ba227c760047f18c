//! Session lifecycle handlers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for the /sessions/reset endpoint.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub conversation_id: String,
}

/// POST /api/sessions/reset - delete a conversation session.
pub async fn reset_session(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<Value>, AppError> {
    if state.store.delete(&request.conversation_id) {
        info!(conversation_id = %request.conversation_id, "session reset");
        Ok(Json(json!({"success": true, "message": "Session reset"})))
    } else {
        Err(AppError::NotFound("Session not found".to_string()))
    }
}
