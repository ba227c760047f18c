//! Validate-input node -- checks the user's answer for the pending field.
//!
//! Two strategies, selected by the pending ask kind:
//!
//! 1. Format validation (ASK_DATE, ASK_DATETIME): deterministic check
//!    before storing; an invalid answer keeps the pending latch and
//!    injects a re-ask directive for the LLM.
//! 2. Context validation (ASK_TEXT): hold the answer and let the LLM
//!    judge relevance; the storage decision happens in finalize.
//!
//! Dropdown, checkbox, and location answers are accepted immediately --
//! the UI constrains their shape.

use formpilot_types::llm::Message;
use formpilot_types::session::AskKind;
use tracing::{info, warn};

use crate::agent::state::{Patch, StateUpdate, Turn};
use crate::agent::validate::validate_answer;

pub fn validate_input_node(turn: &Turn) -> StateUpdate {
    let raw_answer = turn.user_message.trim().to_string();
    let Some(field_id) = turn.session.pending_field_id.clone() else {
        // Routing guarantees a pending field; bail gracefully anyway.
        return StateUpdate::default();
    };
    let kind = turn.session.pending_action_type.unwrap_or(AskKind::Text);

    let mut update = StateUpdate {
        user_message_added: Patch::Set(true),
        ..Default::default()
    };

    if kind == AskKind::Text {
        // Hold the value; the LLM decides relevance and finalize commits.
        info!(field = %field_id, "holding text answer for LLM validation");
        update.history.push(Message::user(turn.user_message.clone()));
        update.history.push(Message::user(format!(
            "[SYSTEM: The user answered '{raw_answer}' for field '{field_id}'. \
             VALIDATE this answer: Is it relevant and appropriate for the \
             question asked? Does it make sense in context? \
             If YES, proceed to the NEXT unanswered field. \
             If NO (gibberish, irrelevant, nonsensical, or clearly wrong \
             context), re-ask the SAME field '{field_id}' using ASK_TEXT. \
             Politely tell the user why their answer doesn't fit and ask \
             again in a clearer way.]"
        )));
        update.pending_text_value = Patch::Set(Some(raw_answer));
        update.pending_text_field_id = Patch::Set(Some(field_id));
        return update.clear_pending_field();
    }

    match validate_answer(kind, &raw_answer, turn.today) {
        Ok(value) => {
            info!(field = %field_id, "auto-stored answer");
            update.answers.insert(field_id, value);
            update.history.push(Message::user(turn.user_message.clone()));
            update.clear_pending_field()
        }
        Err(validation_error) => {
            // Keep the pending latch; the LLM re-asks on the next exchange.
            warn!(field = %field_id, kind = kind.action_name(), error = %validation_error,
                "answer failed validation");
            update.history.push(Message::user(turn.user_message.clone()));
            update.history.push(Message::user(format!(
                "[SYSTEM: The user's answer '{raw_answer}' for field \
                 '{field_id}' is INVALID. {validation_error} \
                 You MUST re-ask this field using {} with field_id \
                 '{field_id}'. Tell the user their input was not valid and \
                 ask again.]",
                kind.action_name()
            )));
            update
        }
    }
}
