//! Finalize node -- post-processes the LLM response and tracks state.
//!
//! Runs last on every non-greeting path: resolves the held text answer
//! (accept or discard based on whether the LLM re-asked the same field),
//! merges any bundled field value, re-latches the pending field/tool from
//! the new action, fills FORM_COMPLETE data from the full answer set,
//! records the assistant message, and emits the turn's action.

use std::collections::BTreeMap;

use formpilot_types::action::Action;
use formpilot_types::llm::Message;
use formpilot_types::session::AskKind;
use serde_json::Value;
use tracing::info;

use crate::agent::payload::{ActionKind, LlmPayload};
use crate::agent::state::{Patch, StateUpdate, Turn};

pub fn finalize_node(turn: &Turn) -> StateUpdate {
    let Some(LlmPayload::Action(payload)) = &turn.parsed else {
        // Routing sends only direct actions here; anything else is a no-op.
        return StateUpdate::default();
    };
    let payload = payload.clone();
    let session = &turn.session;

    let mut update = StateUpdate::default();

    // --- Resolve the held text answer (LLM contextual validation) ---
    // A re-ask of the same field means the LLM rejected the answer;
    // anything else means it moved on, so the held value commits.
    if let (Some(held_value), Some(held_field)) = (
        session.pending_text_value.clone(),
        session.pending_text_field_id.clone(),
    ) {
        let is_reask =
            payload.kind.is_ask() && payload.field_id.as_deref() == Some(held_field.as_str());
        if is_reask {
            info!(field = %held_field, "LLM rejected held text answer, discarding");
        } else {
            info!(field = %held_field, "LLM accepted held text answer");
            update.answers.insert(held_field, Value::String(held_value));
        }
        update.pending_text_value = Patch::Set(None);
        update.pending_text_field_id = Patch::Set(None);
    }

    // An explicitly bundled {field_id, value} pair stores immediately.
    if let (Some(field_id), Some(value)) = (&payload.field_id, &payload.value) {
        if !value.is_null() {
            update.answers.insert(field_id.clone(), value.clone());
        }
    }

    // --- Re-latch pending state from the new action ---
    if payload.kind.is_ask() {
        let field_id = payload.field_id.clone().unwrap_or_default();
        info!(field = %field_id, kind = payload.kind.tag(), "now asking field");
        update.pending_field_id = Patch::Set(Some(field_id));
        update.pending_action_type = Patch::Set(ask_kind_of(payload.kind));
        update.pending_tool_name = Patch::Set(None);
    } else if payload.kind == ActionKind::ToolCall {
        info!(tool = ?payload.tool_name, "pending tool call");
        update.pending_tool_name = Patch::Set(payload.tool_name.clone());
        update = update.clear_pending_field();
    } else {
        update.pending_tool_name = Patch::Set(None);
        update = update.clear_pending_field();
    }

    // Merge the payload's own completion data before computing the final
    // answer set; FORM_COMPLETE.data always ends up equal to it.
    if payload.kind == ActionKind::FormComplete {
        if let Some(data) = &payload.data {
            for (field_id, value) in data {
                update.answers.insert(field_id.clone(), value.clone());
            }
        }
    }

    let mut merged: BTreeMap<String, Value> = session.answers.clone();
    for (field_id, value) in &update.answers {
        merged.insert(field_id.clone(), value.clone());
    }

    // --- Step checkpoint: a completed non-final step pauses for review ---
    if let Some(checkpoint) = step_checkpoint(turn, &payload.kind, &merged) {
        update.awaiting_step_confirmation = Patch::Set(true);
        update = update.clear_pending_field();
        update.history.push(Message::assistant(checkpoint.clone()));
        update.action = Patch::Set(Some(Action::message(checkpoint)));
        return update;
    }

    if let Some(message) = payload.display_message() {
        update.history.push(Message::assistant(message.to_string()));
    }

    update.action = Patch::Set(Some(payload.into_action(&merged)));
    update
}

/// When a multi-step form just completed its current (non-final) step,
/// build the review summary that pauses the flow for confirmation.
fn step_checkpoint(
    turn: &Turn,
    kind: &ActionKind,
    merged: &BTreeMap<String, Value>,
) -> Option<String> {
    let session = &turn.session;
    if !session.has_steps()
        || session.awaiting_step_confirmation
        || session.current_step >= session.max_step
        || session.completed_steps.contains(&session.current_step)
    {
        return None;
    }
    // Mid-flight actions that are not questions never pause the flow.
    if matches!(kind, ActionKind::ToolCall | ActionKind::FormComplete) {
        return None;
    }

    let step_fields = session.required_fields_by_step.get(&session.current_step)?;
    if step_fields.iter().any(|id| !merged.contains_key(id)) {
        return None;
    }

    let mut lines = vec![format!(
        "Step {} is complete. Here's what I have so far:",
        session.current_step
    )];
    for field_id in step_fields {
        let display = match &merged[field_id] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lines.push(format!("- {field_id}: {display}"));
    }
    lines.push(
        "Please confirm to continue, or tell me what you'd like to update.".to_string(),
    );
    Some(lines.join("\n"))
}

fn ask_kind_of(kind: ActionKind) -> Option<AskKind> {
    match kind {
        ActionKind::AskText => Some(AskKind::Text),
        ActionKind::AskDropdown => Some(AskKind::Dropdown),
        ActionKind::AskCheckbox => Some(AskKind::Checkbox),
        ActionKind::AskDate => Some(AskKind::Date),
        ActionKind::AskDatetime => Some(AskKind::Datetime),
        ActionKind::AskLocation => Some(AskKind::Location),
        _ => None,
    }
}
