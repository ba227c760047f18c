//! Parsed LLM payloads.
//!
//! The model answers with loose JSON: either a bulk-extraction
//! `multi_answer` object or one of the nine action shapes, often with
//! extra keys (a bundled `value`, a `message` on anything). This module
//! normalizes that into a typed payload the guards and finalize node can
//! reason about, and converts it to the strict wire [`Action`] at the end
//! of the turn.

use std::collections::BTreeMap;
use std::fmt;

use formpilot_types::action::Action;
use serde_json::Value;

/// The nine recognized action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Message,
    AskText,
    AskDropdown,
    AskCheckbox,
    AskDate,
    AskDatetime,
    AskLocation,
    ToolCall,
    FormComplete,
}

impl ActionKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "MESSAGE" => Some(ActionKind::Message),
            "ASK_TEXT" => Some(ActionKind::AskText),
            "ASK_DROPDOWN" => Some(ActionKind::AskDropdown),
            "ASK_CHECKBOX" => Some(ActionKind::AskCheckbox),
            "ASK_DATE" => Some(ActionKind::AskDate),
            "ASK_DATETIME" => Some(ActionKind::AskDatetime),
            "ASK_LOCATION" => Some(ActionKind::AskLocation),
            "TOOL_CALL" => Some(ActionKind::ToolCall),
            "FORM_COMPLETE" => Some(ActionKind::FormComplete),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::Message => "MESSAGE",
            ActionKind::AskText => "ASK_TEXT",
            ActionKind::AskDropdown => "ASK_DROPDOWN",
            ActionKind::AskCheckbox => "ASK_CHECKBOX",
            ActionKind::AskDate => "ASK_DATE",
            ActionKind::AskDatetime => "ASK_DATETIME",
            ActionKind::AskLocation => "ASK_LOCATION",
            ActionKind::ToolCall => "TOOL_CALL",
            ActionKind::FormComplete => "FORM_COMPLETE",
        }
    }

    pub fn is_ask(&self) -> bool {
        matches!(
            self,
            ActionKind::AskText
                | ActionKind::AskDropdown
                | ActionKind::AskCheckbox
                | ActionKind::AskDate
                | ActionKind::AskDatetime
                | ActionKind::AskLocation
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A normalized action payload from the LLM, before wire conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPayload {
    pub kind: ActionKind,
    pub text: Option<String>,
    pub message: Option<String>,
    pub field_id: Option<String>,
    pub label: Option<String>,
    pub options: Vec<String>,
    pub tool_name: Option<String>,
    pub tool_args: serde_json::Map<String, Value>,
    pub data: Option<BTreeMap<String, Value>>,
    /// A value the model bundled with the action (an accepted answer
    /// carried alongside the follow-up question).
    pub value: Option<Value>,
}

/// The two top-level shapes the orchestrator accepts from the LLM.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmPayload {
    /// Bulk extraction result: `{"intent": "multi_answer", "answers": ...}`.
    MultiAnswer {
        answers: BTreeMap<String, Value>,
        message: Option<String>,
    },
    Action(ActionPayload),
}

/// Why a JSON object failed to normalize into a payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("unknown action kind '{kind}'")]
    UnknownKind {
        kind: String,
        /// Text content that can be salvaged into a MESSAGE action.
        salvage_text: Option<String>,
    },

    #[error("payload has neither a recognized 'action' nor intent='multi_answer'")]
    NoKind,

    #[error("{kind} payload missing required key '{key}'")]
    MissingKey { kind: ActionKind, key: &'static str },
}

impl LlmPayload {
    /// Normalize a parsed JSON object into a typed payload.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let object = value.as_object().ok_or(PayloadError::NoKind)?;

        if object.get("intent").and_then(Value::as_str) == Some("multi_answer") {
            let answers = object
                .get("answers")
                .and_then(Value::as_object)
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            return Ok(LlmPayload::MultiAnswer {
                answers,
                message: string_key(object, &["message"]),
            });
        }

        let tag = object
            .get("action")
            .and_then(Value::as_str)
            .ok_or(PayloadError::NoKind)?;

        let Some(kind) = ActionKind::from_tag(tag) else {
            return Err(PayloadError::UnknownKind {
                kind: tag.to_string(),
                salvage_text: string_key(object, &["text", "message"]),
            });
        };

        let payload = ActionPayload {
            kind,
            text: string_key(object, &["text"]),
            message: string_key(object, &["message"]),
            field_id: string_key(object, &["field_id"]),
            label: string_key(object, &["label"]),
            options: object
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .map(|o| match o {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            tool_name: string_key(object, &["tool_name"]),
            tool_args: object
                .get("tool_args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            data: object
                .get("data")
                .and_then(Value::as_object)
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            value: object.get("value").cloned(),
        };

        payload.check_required_keys()?;
        Ok(LlmPayload::Action(payload))
    }

    /// The action payload, if this is not a multi-answer.
    pub fn as_action(&self) -> Option<&ActionPayload> {
        match self {
            LlmPayload::Action(payload) => Some(payload),
            LlmPayload::MultiAnswer { .. } => None,
        }
    }
}

impl ActionPayload {
    fn check_required_keys(&self) -> Result<(), PayloadError> {
        let missing = |key| PayloadError::MissingKey { kind: self.kind, key };
        match self.kind {
            ActionKind::Message => {
                if self.text.is_none() && self.message.is_none() {
                    return Err(missing("text"));
                }
            }
            kind if kind.is_ask() => {
                if self.field_id.is_none() {
                    return Err(missing("field_id"));
                }
            }
            ActionKind::ToolCall => {
                if self.tool_name.is_none() {
                    return Err(missing("tool_name"));
                }
            }
            ActionKind::FormComplete => {}
            _ => unreachable!(),
        }
        Ok(())
    }

    /// A plain FORM_COMPLETE payload the driver emits when extraction
    /// fills every required field in one shot.
    pub fn completion(message: Option<String>) -> Self {
        Self {
            kind: ActionKind::FormComplete,
            text: None,
            message,
            field_id: None,
            label: None,
            options: vec![],
            tool_name: None,
            tool_args: serde_json::Map::new(),
            data: None,
            value: None,
        }
    }

    /// The user-facing message carried by this payload, if any.
    pub fn display_message(&self) -> Option<&str> {
        self.message.as_deref().or(self.text.as_deref())
    }

    /// Convert to the strict wire action.
    ///
    /// `answers` fills FORM_COMPLETE's `data`; a missing label falls back
    /// to a humanized field id so the shape contract always holds.
    pub fn into_action(self, answers: &BTreeMap<String, Value>) -> Action {
        let label = |payload: &ActionPayload| {
            payload
                .label
                .clone()
                .unwrap_or_else(|| humanize(payload.field_id.as_deref().unwrap_or_default()))
        };
        let field_id = self.field_id.clone().unwrap_or_default();

        match self.kind {
            ActionKind::Message => Action::Message {
                text: self
                    .text
                    .or(self.message)
                    .unwrap_or_default(),
            },
            ActionKind::AskText => Action::AskText {
                label: label(&self),
                field_id,
                message: self.message,
            },
            ActionKind::AskDropdown => Action::AskDropdown {
                label: label(&self),
                field_id,
                options: self.options,
                message: self.message,
            },
            ActionKind::AskCheckbox => Action::AskCheckbox {
                label: label(&self),
                field_id,
                options: self.options,
                message: self.message,
            },
            ActionKind::AskDate => Action::AskDate {
                label: label(&self),
                field_id,
                message: self.message,
            },
            ActionKind::AskDatetime => Action::AskDatetime {
                label: label(&self),
                field_id,
                message: self.message,
            },
            ActionKind::AskLocation => Action::AskLocation {
                label: label(&self),
                field_id,
                message: self.message,
            },
            ActionKind::ToolCall => Action::ToolCall {
                tool_name: self.tool_name.unwrap_or_default(),
                tool_args: self.tool_args,
                message: self.message,
            },
            ActionKind::FormComplete => Action::FormComplete {
                data: answers.clone(),
                message: self.message,
            },
        }
    }
}

fn string_key(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// "injury_description" -> "Injury description".
fn humanize(field_id: &str) -> String {
    let spaced = field_id.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_multi_answer_parse() {
        let value = json!({
            "intent": "multi_answer",
            "answers": {"leave_type": "Annual", "start_date": "2026-03-01"},
            "message": "Got it!"
        });
        match LlmPayload::from_value(&value).unwrap() {
            LlmPayload::MultiAnswer { answers, message } => {
                assert_eq!(answers["leave_type"], json!("Annual"));
                assert_eq!(message.as_deref(), Some("Got it!"));
            }
            other => panic!("expected MultiAnswer, got {other:?}"),
        }
    }

    #[test]
    fn test_action_parse_with_bundled_value() {
        let value = json!({
            "action": "ASK_DATE",
            "field_id": "end_date",
            "label": "End date",
            "value": "2026-03-01",
        });
        let payload = LlmPayload::from_value(&value).unwrap();
        let action = payload.as_action().unwrap();
        assert_eq!(action.kind, ActionKind::AskDate);
        assert_eq!(action.value, Some(json!("2026-03-01")));
    }

    #[test]
    fn test_unknown_kind_carries_salvage_text() {
        let value = json!({"action": "CHITCHAT", "text": "How is your day?"});
        match LlmPayload::from_value(&value) {
            Err(PayloadError::UnknownKind { kind, salvage_text }) => {
                assert_eq!(kind, "CHITCHAT");
                assert_eq!(salvage_text.as_deref(), Some("How is your day?"));
            }
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_key() {
        let value = json!({"action": "ASK_TEXT", "label": "No field id"});
        assert!(matches!(
            LlmPayload::from_value(&value),
            Err(PayloadError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_no_kind() {
        assert!(matches!(
            LlmPayload::from_value(&json!({"hello": "world"})),
            Err(PayloadError::NoKind)
        ));
        assert!(matches!(
            LlmPayload::from_value(&json!("just a string")),
            Err(PayloadError::NoKind)
        ));
    }

    #[test]
    fn test_into_action_fills_completion_data() {
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), json!(1));
        let action = ActionPayload::completion(None).into_action(&answers);
        match action {
            Action::FormComplete { data, .. } => assert_eq!(data["a"], json!(1)),
            other => panic!("expected FORM_COMPLETE, got {}", other.kind()),
        }
    }

    #[test]
    fn test_into_action_defaults_label() {
        let value = json!({"action": "ASK_TEXT", "field_id": "injury_description"});
        let payload = LlmPayload::from_value(&value).unwrap();
        let action = payload.as_action().unwrap().clone().into_action(&BTreeMap::new());
        match action {
            Action::AskText { label, .. } => assert_eq!(label, "Injury description"),
            other => panic!("expected ASK_TEXT, got {}", other.kind()),
        }
    }

    #[test]
    fn test_message_falls_back_to_message_key() {
        let value = json!({"action": "MESSAGE", "message": "hi there"});
        let payload = LlmPayload::from_value(&value).unwrap();
        let action = payload.as_action().unwrap().clone().into_action(&BTreeMap::new());
        assert_eq!(action, Action::message("hi there"));
    }
}
