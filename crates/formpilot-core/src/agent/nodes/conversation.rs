//! Conversation node -- one guarded LLM exchange.
//!
//! Builds the conversation system prompt from the session, replays the
//! recent history to the model, and runs the guarded call. On total
//! failure the node sets the fallback MESSAGE action itself and the
//! driver skips finalize.

use formpilot_types::action::Action;
use formpilot_types::llm::{Message, MessageRole};

use crate::agent::guards::{call_llm_with_guards, GuardContext};
use crate::agent::prompt::build_conversation_prompt;
use crate::agent::state::{Patch, StateUpdate, Turn};
use crate::form::parse_form_definition;
use crate::llm::BoxLlmProvider;

/// Maximum history entries replayed to the LLM per turn.
pub const MAX_HISTORY_MESSAGES: usize = 30;

const FALLBACK_TEXT: &str =
    "Sorry, I had trouble understanding that. Could you try again in one short sentence?";

pub async fn conversation_node(turn: &Turn, llm: &BoxLlmProvider, model: &str) -> StateUpdate {
    let session = &turn.session;
    let definition = parse_form_definition(&session.form_context_md);

    let mut new_entries: Vec<Message> = Vec::new();
    if !turn.user_message_added && !turn.user_message.trim().is_empty() {
        new_entries.push(Message::user(turn.user_message.clone()));
    }

    // The LLM sees the persisted history plus anything this turn added.
    let full_history: Vec<&Message> = session
        .conversation_history
        .iter()
        .chain(new_entries.iter())
        .collect();

    let system = build_conversation_prompt(session, turn.today);

    let start = full_history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    let messages: Vec<Message> = full_history[start..]
        .iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .map(|m| (*m).clone())
        .collect();

    let ctx = GuardContext {
        definition: &definition,
        answers: &session.answers,
        required_fields: &session.required_fields,
        initial_extraction_done: session.initial_extraction_done,
        allow_answered_field_update: turn.allow_answered_field_update,
        held_text_field_id: session.pending_text_field_id.as_deref(),
    };

    let parsed = call_llm_with_guards(llm, model, &system, messages, ctx).await;

    let mut update = StateUpdate {
        user_message_added: Patch::Set(true),
        history: new_entries,
        ..Default::default()
    };

    match parsed {
        Some(payload) => {
            update.parsed = Patch::Set(Some(payload));
        }
        None => {
            update.history.push(Message::assistant(FALLBACK_TEXT));
            update.action = Patch::Set(Some(Action::message(FALLBACK_TEXT)));
            update.parsed = Patch::Set(None);
        }
    }

    update
}
