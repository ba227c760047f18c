//! Tool-handler node -- folds client tool results into the conversation.
//!
//! Tool results never touch `answers` directly; each one becomes a
//! history directive carrying the raw result plus an extracted "options
//! hint" so the LLM can present the data via ASK_DROPDOWN on its next
//! turn. A result for a tool other than the pending one is skipped (and
//! logged -- silent drops hide client bugs).

use formpilot_types::llm::Message;
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::state::{Patch, StateUpdate, Turn};

pub fn tool_handler_node(turn: &Turn) -> StateUpdate {
    let mut update = StateUpdate {
        user_message_added: Patch::Set(true),
        pending_tool_name: Patch::Set(None),
        ..Default::default()
    };

    for result in &turn.tool_results {
        if let Some(pending) = &turn.session.pending_tool_name {
            if pending != &result.tool_name {
                warn!(
                    expected = %pending,
                    received = %result.tool_name,
                    "ignoring tool result for a tool that was not requested"
                );
                continue;
            }
        }

        let result_json = result.result.to_string();
        let mut directive = format!("[Tool result for {}]: {result_json}", result.tool_name);
        match extract_options_hint(&result.result) {
            Some(options_hint) => {
                directive.push_str(&format!(
                    "\n\n[INSTRUCTION: Use the data above. Return ASK_DROPDOWN \
                     with these options: {options_hint}]"
                ));
            }
            None => {
                directive.push_str(
                    "\n\n[INSTRUCTION: Use the data above to continue the form. \
                     Return the appropriate JSON action.]",
                );
            }
        }
        info!(tool = %result.tool_name, "processed tool result");
        update.history.push(Message::user(directive));
    }

    if !turn.user_message.trim().is_empty() {
        update.history.push(Message::user(turn.user_message.clone()));
    }

    update
}

/// Pull human-readable option names out of a tool result.
///
/// Scans every list in the result object; for each entry the first hit in
/// priority order wins: `name.english`, `name`, `value.english`, `value`,
/// `label`, `title`, `text`, `description`. Returns the options as a JSON
/// array string, or `None` when nothing usable was found.
pub fn extract_options_hint(tool_data: &Value) -> Option<String> {
    let object = tool_data.as_object()?;
    let mut options: Vec<String> = Vec::new();

    for value in object.values() {
        let Some(items) = value.as_array() else {
            continue;
        };
        for item in items {
            let Some(entry) = item.as_object() else {
                continue;
            };
            if let Some(option) = option_from_entry(entry) {
                options.push(option);
            }
        }
    }

    if options.is_empty() {
        None
    } else {
        serde_json::to_string(&options).ok()
    }
}

fn option_from_entry(entry: &serde_json::Map<String, Value>) -> Option<String> {
    // Bilingual name objects prefer the English variant.
    if let Some(english) = nested_english(entry.get("name")) {
        return Some(english);
    }
    if let Some(name) = entry.get("name").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    if let Some(english) = nested_english(entry.get("value")) {
        return Some(english);
    }
    if let Some(value) = entry.get("value").and_then(Value::as_str) {
        return Some(value.to_string());
    }
    for key in ["label", "title", "text", "description"] {
        if let Some(text) = entry.get(key).and_then(Value::as_str) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn nested_english(value: Option<&Value>) -> Option<String> {
    value?
        .as_object()?
        .get("english")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
