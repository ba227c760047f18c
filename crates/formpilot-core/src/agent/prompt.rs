//! System prompt assembly.
//!
//! Two templates parameterized by session state: the conversation prompt
//! (identity + action catalog + rules + validation examples + condensed
//! form reference + current state) and the stripped extraction prompt.
//! The fixed sections are `const` strings so tests can pin exact output.

use chrono::NaiveDate;
use formpilot_types::form::{FieldType, FormDefinition, Requirement};
use formpilot_types::session::{AskKind, SessionState};

use crate::form::condense::condense_form_context;
use crate::form::visibility::is_field_visible;
use crate::form::parse_form_definition;

/// Identity and output contract. Blunt on purpose: small models need it.
pub const OUTPUT_CONTRACT: &str = "\
You are FormPilot AI, a conversational form-filling assistant. \
You are a JSON-only API. Every response must be a single JSON object \
matching exactly one of the action shapes below. No prose outside JSON. \
No markdown fences. No explanations.";

/// The nine action shapes with their required keys.
pub const ACTION_CATALOG: &str = r#"## Actions
- {"action": "MESSAGE", "text": "<chat text>"}
- {"action": "ASK_TEXT", "field_id": "<id>", "label": "<question>", "message": "<optional chat text>"}
- {"action": "ASK_DROPDOWN", "field_id": "<id>", "label": "<question>", "options": ["<option>", ...], "message": "<optional>"}
- {"action": "ASK_CHECKBOX", "field_id": "<id>", "label": "<question>", "options": ["<option>", ...], "message": "<optional>"}
- {"action": "ASK_DATE", "field_id": "<id>", "label": "<question>", "message": "<optional>"}
- {"action": "ASK_DATETIME", "field_id": "<id>", "label": "<question>", "message": "<optional>"}
- {"action": "ASK_LOCATION", "field_id": "<id>", "label": "<question>", "message": "<optional>"}
- {"action": "TOOL_CALL", "tool_name": "<name>", "tool_args": {}, "message": "<optional>"}
- {"action": "FORM_COMPLETE", "data": {"<field_id>": "<value>", ...}, "message": "<optional>"}"#;

/// Behavioral rules for the conversation turn.
pub const CONVERSATION_RULES: &str = "\
## Rules
1. Ask for exactly ONE field per turn. Never skip ahead or batch questions.
2. NEVER re-ask a field that already has an answer. Move to the next missing field.
3. NEVER assume, guess, or fabricate values. Only use what the user provides.
4. For fields whose options come from a tool, emit TOOL_CALL first; on the \
next turn emit the matching ASK_DROPDOWN populated from the tool result.
5. Dates are stored as YYYY-MM-DD and datetimes as YYYY-MM-DDTHH:MM:SS.
6. Emit FORM_COMPLETE only when every required field has an answer.";

/// Worked examples for contextual validation of held text answers.
pub const VALIDATION_EXAMPLES: &str = r#"## Validating text answers
When a system note asks you to VALIDATE a held text answer:

Example (accept): the user answered "I slipped on a wet floor and broke my wrist"
for 'injury_description'. The answer is relevant, so move on:
{"action": "ASK_DATE", "field_id": "injury_date", "label": "When did the injury happen?"}

Example (reject): the user answered "qwerty" for 'injury_description'. The answer
is gibberish, so re-ask the SAME field and say why:
{"action": "ASK_TEXT", "field_id": "injury_description", "label": "Please describe how the injury happened", "message": "That didn't look like a description. Could you describe what happened?"}"#;

/// Extraction rules for the bulk first-message pass.
pub const EXTRACTION_RULES: &str = r#"## Rules
1. ONLY extract values the user explicitly stated. NEVER assume, guess, or fabricate.
2. Match values to the field ids listed below.
3. Dates become "YYYY-MM-DD"; datetimes become "YYYY-MM-DDTHH:MM:SS".
4. For dropdown fields use the exact option string; for checkbox fields a JSON array of option strings.
5. Skip any field you are not confident about.

## Your response
A single JSON object:
{"intent": "multi_answer", "answers": {"<field_id>": "<value>", ...}, "message": "<friendly summary of what you extracted>"}

If you cannot extract anything, return an empty answers object and ask for
clearer information in the message."#;

/// Assemble the conversation system prompt.
pub fn build_conversation_prompt(session: &SessionState, today: NaiveDate) -> String {
    let definition = parse_form_definition(&session.form_context_md);
    let form_reference = condense_form_context(&session.form_context_md);
    let state_block = build_state_block(session, &definition, today);

    format!(
        "{OUTPUT_CONTRACT}\n\n{ACTION_CATALOG}\n\n{CONVERSATION_RULES}\n\n\
         {VALIDATION_EXAMPLES}\n\n## Form Reference\n\n{form_reference}\n\n\
         ## Current State\n\n{state_block}"
    )
}

/// Assemble the extraction system prompt.
pub fn build_extraction_prompt(session: &SessionState) -> String {
    let mut field_lines = String::new();
    for field_id in &session.required_fields {
        let field_type = session
            .field_types
            .get(field_id)
            .copied()
            .unwrap_or(FieldType::Text);
        field_lines.push_str(&format!("- {field_id}: {field_type}\n"));
    }

    format!(
        "{OUTPUT_CONTRACT}\n\n## Fields to extract\n{field_lines}\n{EXTRACTION_RULES}"
    )
}

fn build_state_block(
    session: &SessionState,
    definition: &FormDefinition,
    today: NaiveDate,
) -> String {
    let mut lines = Vec::new();

    let answers_json =
        serde_json::to_string(&session.answers).unwrap_or_else(|_| "{}".to_string());
    lines.push(format!("Answers so far: {answers_json}"));

    let missing = session.missing_required_fields();
    if missing.is_empty() {
        lines.push("All required fields are answered. Emit FORM_COMPLETE now.".to_string());
    } else {
        lines.push(format!("Still missing, in order: [{}]", missing.join(", ")));
    }

    let hidden = hidden_conditional_fields(session, definition, today);
    if !hidden.is_empty() {
        lines.push(format!(
            "Currently hidden conditional fields (do NOT ask these): [{}]",
            hidden.join(", ")
        ));
    }

    if let Some(hint) = next_step_hint(session, definition) {
        lines.push(hint);
    }

    lines.join("\n")
}

/// Conditional fields whose visibility rule currently fails.
fn hidden_conditional_fields(
    session: &SessionState,
    definition: &FormDefinition,
    today: NaiveDate,
) -> Vec<String> {
    definition
        .fields
        .iter()
        .filter(|f| f.requirement == Requirement::Conditional)
        .filter(|f| !is_field_visible(f, &session.answers, today))
        .map(|f| f.id.clone())
        .collect()
}

/// The explicit next-step hint: the single next field to ask and whether a
/// TOOL_CALL must come first.
fn next_step_hint(session: &SessionState, definition: &FormDefinition) -> Option<String> {
    let next = next_missing_field(session)?;
    let field_type = session
        .field_types
        .get(next)
        .copied()
        .unwrap_or(FieldType::Text);
    let ask = AskKind::for_field_type(field_type).action_name();

    let mut hint = format!("Next field to ask: '{next}' ({field_type}) using {ask}.");

    if let Some(field) = definition.field(next) {
        if !field.options.is_empty() {
            hint.push_str(&format!(" Options: [{}].", field.options.join(", ")));
        } else if let Some(tool) = &field.options_tool {
            hint.push_str(&format!(
                " Its options come from the tool '{tool}': emit TOOL_CALL for '{tool}' first."
            ));
        }
        if let Some(prompt) = &field.prompt {
            hint.push_str(&format!(" Suggested wording: \"{prompt}\""));
        }
    }

    Some(hint)
}

/// The next missing required field, restricted to the current step when
/// the form uses step checkpoints.
pub fn next_missing_field(session: &SessionState) -> Option<&str> {
    if session.has_steps() {
        let in_step = session.missing_in_step(session.current_step);
        if let Some(first) = in_step.first() {
            return Some(*first);
        }
    }
    session.missing_required_fields().into_iter().next()
}
