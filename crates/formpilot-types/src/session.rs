//! Per-conversation session state.
//!
//! One [`SessionState`] lives for the whole conversation and is mutated
//! turn by turn. The orchestrator works on a copy during a turn and the
//! store commits it back only when the turn completes, so a cancelled
//! request never leaves a half-applied turn behind.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::form::{FieldType, FormDefinition};
use crate::llm::Message;

/// The `ASK_*` kind of the field the orchestrator is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AskKind {
    Text,
    Dropdown,
    Checkbox,
    Date,
    Datetime,
    Location,
}

impl AskKind {
    /// Wire tag of the matching action, e.g. `"ASK_DATE"`.
    pub fn action_name(&self) -> &'static str {
        match self {
            AskKind::Text => "ASK_TEXT",
            AskKind::Dropdown => "ASK_DROPDOWN",
            AskKind::Checkbox => "ASK_CHECKBOX",
            AskKind::Date => "ASK_DATE",
            AskKind::Datetime => "ASK_DATETIME",
            AskKind::Location => "ASK_LOCATION",
        }
    }

    /// The ask kind used to collect a field of the given type.
    pub fn for_field_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Dropdown => AskKind::Dropdown,
            FieldType::Checkbox => AskKind::Checkbox,
            FieldType::Date => AskKind::Date,
            FieldType::Datetime => AskKind::Datetime,
            FieldType::Location => AskKind::Location,
            FieldType::Text | FieldType::Time | FieldType::File => AskKind::Text,
        }
    }
}

/// A tool result sent back by the client after a `TOOL_CALL` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<serde_json::Map<String, Value>>,
    pub result: Value,
}

/// Input for a single conversation turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub user_message: String,
    pub tool_results: Vec<ToolResult>,
}

/// Complete state for a form-filling conversation.
///
/// Split into sections: immutable form metadata (set at creation),
/// accumulated state (answers, history), and phase tracking (extraction
/// flag, pending field/text/tool latches, step checkpoints).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    // --- Form metadata (set at creation, immutable) ---
    pub form_context_md: String,
    pub required_fields: Vec<String>,
    pub field_types: HashMap<String, FieldType>,
    pub field_prompts: HashMap<String, String>,
    pub required_fields_by_step: BTreeMap<u32, Vec<String>>,

    // --- Accumulated state ---
    pub answers: BTreeMap<String, Value>,
    pub conversation_history: Vec<Message>,

    // --- Phase tracking ---
    pub initial_extraction_done: bool,
    pub pending_field_id: Option<String>,
    pub pending_action_type: Option<AskKind>,
    pub pending_text_value: Option<String>,
    pub pending_text_field_id: Option<String>,
    pub pending_tool_name: Option<String>,

    // --- Step checkpoints (multi-step forms) ---
    pub current_step: u32,
    pub max_step: u32,
    pub completed_steps: Vec<u32>,
    pub awaiting_step_confirmation: bool,

    // --- Timestamps ---
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl SessionState {
    /// Initialize session state from a parsed form definition.
    pub fn new(form_context_md: String, definition: &FormDefinition) -> Self {
        let now = Utc::now();
        let field_types = definition
            .fields
            .iter()
            .map(|f| (f.id.clone(), f.field_type))
            .collect();
        let field_prompts = definition
            .fields
            .iter()
            .filter_map(|f| f.prompt.clone().map(|p| (f.id.clone(), p)))
            .collect();

        Self {
            form_context_md,
            required_fields: definition.required_field_ids(),
            field_types,
            field_prompts,
            required_fields_by_step: definition.required_fields_by_step(),
            answers: BTreeMap::new(),
            conversation_history: Vec::new(),
            initial_extraction_done: false,
            pending_field_id: None,
            pending_action_type: None,
            pending_text_value: None,
            pending_text_field_id: None,
            pending_tool_name: None,
            current_step: 1,
            max_step: definition.max_step(),
            completed_steps: Vec::new(),
            awaiting_step_confirmation: false,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Required fields not yet present in `answers`, in form order.
    pub fn missing_required_fields(&self) -> Vec<&str> {
        self.required_fields
            .iter()
            .filter(|id| !self.answers.contains_key(*id))
            .map(String::as_str)
            .collect()
    }

    /// Whether every required field has a stored answer.
    pub fn all_required_answered(&self) -> bool {
        self.required_fields
            .iter()
            .all(|id| self.answers.contains_key(id))
    }

    /// Whether this session uses step checkpoints (more than one step).
    pub fn has_steps(&self) -> bool {
        self.max_step > 1
    }

    /// Required fields of the given step not yet answered.
    pub fn missing_in_step(&self, step: u32) -> Vec<&str> {
        self.required_fields_by_step
            .get(&step)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|id| !self.answers.contains_key(*id))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormField, Requirement};
    use serde_json::json;

    fn definition() -> FormDefinition {
        FormDefinition {
            title: "Leave Request".to_string(),
            fields: vec![
                FormField {
                    id: "leave_type".to_string(),
                    field_type: FieldType::Dropdown,
                    requirement: Requirement::Required,
                    prompt: Some("What type of leave?".to_string()),
                    options: vec!["Annual".to_string(), "Sick".to_string()],
                    options_tool: None,
                    step: 1,
                    visible_if: None,
                },
                FormField {
                    id: "start_date".to_string(),
                    field_type: FieldType::Date,
                    requirement: Requirement::Required,
                    prompt: None,
                    options: vec![],
                    options_tool: None,
                    step: 1,
                    visible_if: None,
                },
            ],
            tools: vec![],
        }
    }

    #[test]
    fn test_new_session_state() {
        let state = SessionState::new("# Leave Request".to_string(), &definition());
        assert_eq!(state.required_fields, vec!["leave_type", "start_date"]);
        assert_eq!(state.field_types["leave_type"], FieldType::Dropdown);
        assert_eq!(state.field_prompts["leave_type"], "What type of leave?");
        assert!(!state.initial_extraction_done);
        assert!(state.answers.is_empty());
        assert!(state.last_accessed_at >= state.created_at);
    }

    #[test]
    fn test_missing_required_fields() {
        let mut state = SessionState::new("#".to_string(), &definition());
        assert_eq!(state.missing_required_fields(), vec!["leave_type", "start_date"]);
        assert!(!state.all_required_answered());

        state.answers.insert("leave_type".to_string(), json!("Annual"));
        assert_eq!(state.missing_required_fields(), vec!["start_date"]);

        state.answers.insert("start_date".to_string(), json!("2026-03-01"));
        assert!(state.all_required_answered());
    }

    #[test]
    fn test_ask_kind_for_field_type() {
        assert_eq!(AskKind::for_field_type(FieldType::Date), AskKind::Date);
        assert_eq!(AskKind::for_field_type(FieldType::File), AskKind::Text);
        assert_eq!(AskKind::Dropdown.action_name(), "ASK_DROPDOWN");
    }
}
