//! Step-confirmation node -- human-in-the-loop checkpoint between steps.
//!
//! When a step of a multi-step form is complete, the user must confirm it
//! before the assistant moves on. The reply is classified as a
//! confirmation, an edit request, or unclear, by keyword token matching
//! (English and Arabic vocabularies).

use formpilot_types::action::Action;
use formpilot_types::form::FieldType;
use formpilot_types::llm::Message;
use formpilot_types::session::AskKind;
use tracing::info;

use crate::agent::state::{Patch, StateUpdate, Turn};

const CONFIRM_WORDS: &[&str] = &[
    "yes", "ok", "okay", "confirm", "confirmed", "continue", "proceed",
    "looks good", "all good", "correct", "approved",
    "نعم", "ايوه", "ايوا", "تمام", "موافق", "اكمل", "استمر",
];

const EDIT_WORDS: &[&str] = &[
    "change", "update", "edit", "modify", "fix", "wrong", "not correct",
    "تعديل", "غير", "غيّر", "عدل", "صحح", "خطأ", "مو صحيح",
];

pub fn step_confirmation_node(turn: &Turn) -> StateUpdate {
    let session = &turn.session;
    let user_message = turn.user_message.trim().to_string();
    let current_step = session.current_step;
    let step_fields = session
        .required_fields_by_step
        .get(&current_step)
        .cloned()
        .unwrap_or_default();
    let text = user_message.to_lowercase();

    let mut update = StateUpdate {
        user_message_added: Patch::Set(true),
        history: vec![Message::user(user_message.clone())],
        skip_conversation_turn: Patch::Set(false),
        ..Default::default()
    };

    if is_confirmation(&text) {
        info!(step = current_step, "user confirmed step");
        let mut completed = session.completed_steps.clone();
        if !completed.contains(&current_step) {
            completed.push(current_step);
        }
        update.completed_steps = Patch::Set(completed);
        update.awaiting_step_confirmation = Patch::Set(false);
        update.allow_answered_field_update = Patch::Set(false);
        update = update.clear_pending_field();
        if current_step < session.max_step {
            update.current_step = Patch::Set(current_step + 1);
        }
        update.history.push(Message::user(format!(
            "[SYSTEM: The user confirmed Step {current_step}. Proceed to the \
             next step now. Ask the next required unanswered field.]"
        )));
        return update;
    }

    if is_edit_request(&text) {
        info!(step = current_step, "user requested an edit before confirming");
        update.awaiting_step_confirmation = Patch::Set(false);
        update.allow_answered_field_update = Patch::Set(true);
        update = update.clear_pending_field();

        if let Some(field_id) = infer_requested_field(&text, &step_fields, session) {
            let kind = ask_kind_for_edit(
                session.field_types.get(&field_id).copied().unwrap_or(FieldType::Text),
            );
            let prompt_text = session
                .field_prompts
                .get(&field_id)
                .cloned()
                .unwrap_or_else(|| format!("Please share the updated value for {field_id}."));
            let ask_message = format!("Sure, let's update that. {prompt_text}");

            update.action = Patch::Set(Some(match kind {
                AskKind::Date => Action::AskDate {
                    field_id: field_id.clone(),
                    label: prompt_text.clone(),
                    message: Some(ask_message.clone()),
                },
                AskKind::Datetime => Action::AskDatetime {
                    field_id: field_id.clone(),
                    label: prompt_text.clone(),
                    message: Some(ask_message.clone()),
                },
                AskKind::Location => Action::AskLocation {
                    field_id: field_id.clone(),
                    label: prompt_text.clone(),
                    message: Some(ask_message.clone()),
                },
                _ => Action::AskText {
                    field_id: field_id.clone(),
                    label: prompt_text.clone(),
                    message: Some(ask_message.clone()),
                },
            }));
            update.pending_field_id = Patch::Set(Some(field_id));
            update.pending_action_type = Patch::Set(Some(kind));
            update.skip_conversation_turn = Patch::Set(true);
            update.history.push(Message::assistant(ask_message));
            return update;
        }

        update.history.push(Message::user(format!(
            "[SYSTEM: The user requested changes before confirming Step \
             {current_step}. Step {current_step} fields: [{}]. Help them \
             update the requested item. Do NOT move to the next step yet. \
             Once Step {current_step} is complete again, provide a new \
             summary and ask for confirmation.]",
            step_fields.join(", ")
        )));
        return update;
    }

    // Unclear reply: keep waiting for an explicit confirm or edit request.
    let msg = format!(
        "Step {current_step} is ready. Please confirm to continue, or tell \
         me what you'd like to update in this step."
    );
    update.action = Patch::Set(Some(Action::message(msg.clone())));
    update.allow_answered_field_update = Patch::Set(false);
    update.skip_conversation_turn = Patch::Set(true);
    update.history.push(Message::assistant(msg));
    update
}

fn is_confirmation(text: &str) -> bool {
    CONFIRM_WORDS.iter().any(|token| has_token(text, token))
}

fn is_edit_request(text: &str) -> bool {
    EDIT_WORDS.iter().any(|token| has_token(text, token))
}

/// Short latin words match on word boundaries only ("ok" must not match
/// inside "broken"); longer tokens and Arabic match as substrings.
fn has_token(text: &str, token: &str) -> bool {
    if token.is_ascii() && token.chars().all(char::is_alphabetic) && token.len() <= 3 {
        return text.split(|c: char| !c.is_alphanumeric()).any(|word| word == token);
    }
    text.contains(token)
}

/// Try to work out which field the user wants to change: a literal field
/// id mention first, then significant words from the field's prompt.
fn infer_requested_field(
    text: &str,
    step_fields: &[String],
    session: &formpilot_types::session::SessionState,
) -> Option<String> {
    for field_id in step_fields {
        if text.contains(&field_id.to_lowercase()) {
            return Some(field_id.clone());
        }
        if let Some(label) = session.field_prompts.get(field_id) {
            let label = label.to_lowercase();
            if important_words(&label).iter().any(|word| text.contains(word)) {
                return Some(field_id.clone());
            }
        }
    }
    None
}

fn important_words(label: &str) -> Vec<String> {
    label
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.len() >= 4)
        .filter(|w| !matches!(*w, "please" | "provide" | "share" | "what" | "your"))
        .map(str::to_string)
        .collect()
}

fn ask_kind_for_edit(field_type: FieldType) -> AskKind {
    match field_type {
        FieldType::Date => AskKind::Date,
        FieldType::Datetime => AskKind::Datetime,
        FieldType::Location => AskKind::Location,
        // Dropdowns have no options at hand here; free text is re-validated
        // by the LLM on the next turn.
        _ => AskKind::Text,
    }
}
