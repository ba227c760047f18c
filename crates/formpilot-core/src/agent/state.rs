//! Per-turn working state and reducer application.
//!
//! The driver takes a copy of the session state, threads it through the
//! nodes as part of a [`Turn`], and the caller commits the mutated session
//! back to the store only when the turn completes. Nodes never mutate the
//! turn directly; they return a [`StateUpdate`] and the driver applies it:
//! `answers` merge by key, `conversation_history` appends, scalars replace.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use formpilot_types::action::Action;
use formpilot_types::llm::Message;
use formpilot_types::session::{AskKind, SessionState, ToolResult};
use serde_json::Value;

use super::payload::LlmPayload;

/// A scalar field update: either keep the current value or replace it.
#[derive(Debug, Clone, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> Patch<T> {
    fn apply(self, slot: &mut T) {
        if let Patch::Set(value) = self {
            *slot = value;
        }
    }
}

/// Everything a single turn operates on: the working session copy, the
/// turn's input, and the ephemeral fields reset at turn start.
#[derive(Debug)]
pub struct Turn {
    pub session: SessionState,
    pub user_message: String,
    pub tool_results: Vec<ToolResult>,
    /// Reference date for relative date parsing, injected for test
    /// determinism.
    pub today: NaiveDate,

    // --- Ephemeral (reset each turn) ---
    pub user_message_added: bool,
    pub parsed: Option<LlmPayload>,
    pub action: Option<Action>,
    pub skip_conversation_turn: bool,
    pub allow_answered_field_update: bool,
}

impl Turn {
    pub fn new(
        session: SessionState,
        user_message: String,
        tool_results: Vec<ToolResult>,
        today: NaiveDate,
    ) -> Self {
        Self {
            session,
            user_message,
            tool_results,
            today,
            user_message_added: false,
            parsed: None,
            action: None,
            skip_conversation_turn: false,
            allow_answered_field_update: false,
        }
    }

    /// Merge a node's partial update into the turn.
    pub fn apply(&mut self, update: StateUpdate) {
        // Reducer: answers merge by key, new values overwrite old.
        for (field_id, value) in update.answers {
            self.session.answers.insert(field_id, value);
        }
        // Reducer: history is append-only.
        self.session.conversation_history.extend(update.history);

        update
            .initial_extraction_done
            .apply(&mut self.session.initial_extraction_done);
        update.pending_field_id.apply(&mut self.session.pending_field_id);
        update
            .pending_action_type
            .apply(&mut self.session.pending_action_type);
        update
            .pending_text_value
            .apply(&mut self.session.pending_text_value);
        update
            .pending_text_field_id
            .apply(&mut self.session.pending_text_field_id);
        update
            .pending_tool_name
            .apply(&mut self.session.pending_tool_name);
        update.current_step.apply(&mut self.session.current_step);
        update.completed_steps.apply(&mut self.session.completed_steps);
        update
            .awaiting_step_confirmation
            .apply(&mut self.session.awaiting_step_confirmation);

        update.user_message_added.apply(&mut self.user_message_added);
        update.parsed.apply(&mut self.parsed);
        update.action.apply(&mut self.action);
        update
            .skip_conversation_turn
            .apply(&mut self.skip_conversation_turn);
        update
            .allow_answered_field_update
            .apply(&mut self.allow_answered_field_update);
    }
}

/// A node's partial state update.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub answers: BTreeMap<String, Value>,
    pub history: Vec<Message>,
    pub initial_extraction_done: Patch<bool>,
    pub pending_field_id: Patch<Option<String>>,
    pub pending_action_type: Patch<Option<AskKind>>,
    pub pending_text_value: Patch<Option<String>>,
    pub pending_text_field_id: Patch<Option<String>>,
    pub pending_tool_name: Patch<Option<String>>,
    pub current_step: Patch<u32>,
    pub completed_steps: Patch<Vec<u32>>,
    pub awaiting_step_confirmation: Patch<bool>,
    pub user_message_added: Patch<bool>,
    pub parsed: Patch<Option<LlmPayload>>,
    pub action: Patch<Option<Action>>,
    pub skip_conversation_turn: Patch<bool>,
    pub allow_answered_field_update: Patch<bool>,
}

impl StateUpdate {
    /// Clear the pending-field latch.
    pub fn clear_pending_field(mut self) -> Self {
        self.pending_field_id = Patch::Set(None);
        self.pending_action_type = Patch::Set(None);
        self
    }
}
