//! UI action protocol -- structured output the orchestrator emits per turn.
//!
//! Each action maps to a specific widget or behavior in the client. The
//! client reads the action JSON and renders the matching component. The
//! wire format is internally tagged on the `action` key with `snake_case`
//! field names, e.g.:
//!
//! ```json
//! {"action": "ASK_DATE", "field_id": "start_date", "label": "Start date"}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The nine action kinds the orchestrator can emit.
///
/// `MESSAGE` carries free chat text; the `ASK_*` variants request a single
/// field value from the user; `TOOL_CALL` asks the client to execute a
/// named tool and send the result back; `FORM_COMPLETE` carries the full
/// collected answer set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "MESSAGE")]
    Message { text: String },

    #[serde(rename = "ASK_TEXT")]
    AskText {
        field_id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ASK_DROPDOWN")]
    AskDropdown {
        field_id: String,
        label: String,
        options: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ASK_CHECKBOX")]
    AskCheckbox {
        field_id: String,
        label: String,
        options: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ASK_DATE")]
    AskDate {
        field_id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ASK_DATETIME")]
    AskDatetime {
        field_id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ASK_LOCATION")]
    AskLocation {
        field_id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "TOOL_CALL")]
    ToolCall {
        tool_name: String,
        tool_args: serde_json::Map<String, Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "FORM_COMPLETE")]
    FormComplete {
        data: BTreeMap<String, Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Action {
    /// Build a MESSAGE action for conversational responses.
    pub fn message(text: impl Into<String>) -> Self {
        Action::Message { text: text.into() }
    }

    /// Build a TOOL_CALL action requesting the client to execute a tool.
    ///
    /// `tool_args` may be empty but is always present on the wire.
    pub fn tool_call(
        tool_name: impl Into<String>,
        tool_args: serde_json::Map<String, Value>,
        message: Option<String>,
    ) -> Self {
        Action::ToolCall {
            tool_name: tool_name.into(),
            tool_args,
            message,
        }
    }

    /// Build the FORM_COMPLETE action from the full collected answer set.
    ///
    /// Takes a copy of the answers so later session mutation cannot alias
    /// into an already-emitted action.
    pub fn form_complete(answers: &BTreeMap<String, Value>, message: Option<String>) -> Self {
        Action::FormComplete {
            data: answers.clone(),
            message,
        }
    }

    /// The wire tag of this action kind (e.g. `"ASK_DATE"`).
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Message { .. } => "MESSAGE",
            Action::AskText { .. } => "ASK_TEXT",
            Action::AskDropdown { .. } => "ASK_DROPDOWN",
            Action::AskCheckbox { .. } => "ASK_CHECKBOX",
            Action::AskDate { .. } => "ASK_DATE",
            Action::AskDatetime { .. } => "ASK_DATETIME",
            Action::AskLocation { .. } => "ASK_LOCATION",
            Action::ToolCall { .. } => "TOOL_CALL",
            Action::FormComplete { .. } => "FORM_COMPLETE",
        }
    }

    /// Whether this action asks the user for a single field value.
    pub fn is_ask(&self) -> bool {
        matches!(
            self,
            Action::AskText { .. }
                | Action::AskDropdown { .. }
                | Action::AskCheckbox { .. }
                | Action::AskDate { .. }
                | Action::AskDatetime { .. }
                | Action::AskLocation { .. }
        )
    }

    /// The field this action asks about, if it is an `ASK_*`.
    pub fn field_id(&self) -> Option<&str> {
        match self {
            Action::AskText { field_id, .. }
            | Action::AskDropdown { field_id, .. }
            | Action::AskCheckbox { field_id, .. }
            | Action::AskDate { field_id, .. }
            | Action::AskDatetime { field_id, .. }
            | Action::AskLocation { field_id, .. } => Some(field_id),
            _ => None,
        }
    }
}
