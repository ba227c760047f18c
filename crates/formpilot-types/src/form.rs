//! Form definition types.
//!
//! A form is described by a markdown document, optionally opened by a YAML
//! frontmatter header carrying structured field and tool definitions. These
//! types model the structured half of that contract; the markdown body is
//! passed through to the LLM as conversational context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported form field widget types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Dropdown,
    Checkbox,
    Date,
    Datetime,
    Location,
    Time,
    File,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Dropdown => "dropdown",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Location => "location",
            FieldType::Time => "time",
            FieldType::File => "file",
        };
        write!(f, "{name}")
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "dropdown" => Ok(FieldType::Dropdown),
            "checkbox" => Ok(FieldType::Checkbox),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::Datetime),
            "location" => Ok(FieldType::Location),
            "time" => Ok(FieldType::Time),
            "file" => Ok(FieldType::File),
            other => Err(format!("unknown field type: '{other}'")),
        }
    }
}

/// Requirement level of a field.
///
/// `Conditional` fields depend on runtime conditions (visibility rules or
/// judgment left to the LLM) and are excluded from the deterministic
/// required-field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    Required,
    #[default]
    Optional,
    Conditional,
}

impl Requirement {
    /// Parse the frontmatter `required` value: `true`/`"true"` are
    /// required, `"conditional"` is conditional, everything else optional.
    pub fn from_yaml_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Requirement::Required,
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Requirement::Required,
                "conditional" => Requirement::Conditional,
                _ => Requirement::Optional,
            },
            _ => Requirement::Optional,
        }
    }
}

/// Comparison operators for visibility conditions.
///
/// All operators are evaluated deterministically in code, never by the LLM.
/// The date operators compare via the lenient date parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    Exists,
    Equals,
    NotEquals,
    After,
    Before,
    OnOrAfter,
    OnOrBefore,
}

/// A single condition within a visibility rule.
///
/// References another field and applies an operator against either a
/// static `value` or another field's answer (`value_field`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityCondition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
}

/// Visibility rule wrapping a list of conditions with AND logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub all: Vec<VisibilityCondition>,
}

/// Definition of a single form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub id: String,
    pub field_type: FieldType,
    pub requirement: Requirement,
    /// Human-facing question for this field, when the form provides one.
    pub prompt: Option<String>,
    /// Static options for dropdown/checkbox fields.
    pub options: Vec<String>,
    /// Tool that supplies this field's options at runtime.
    pub options_tool: Option<String>,
    /// Step number for multi-step forms (defaults to 1).
    pub step: u32,
    pub visible_if: Option<VisibilityRule>,
}

impl FormField {
    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

/// A tool the client can execute on the orchestrator's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
}

/// The structured view of a form definition, computed once at session
/// creation from the markdown (frontmatter preferred, markdown-table
/// fallback otherwise).
#[derive(Debug, Clone, Default)]
pub struct FormDefinition {
    pub title: String,
    pub fields: Vec<FormField>,
    pub tools: Vec<ToolSpec>,
}

impl FormDefinition {
    /// Ordered identifiers of all required fields.
    pub fn required_field_ids(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.id.clone())
            .collect()
    }

    /// Look up a field definition by id.
    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Highest step number any required field belongs to (at least 1).
    pub fn max_step(&self) -> u32 {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.step)
            .max()
            .unwrap_or(1)
    }

    /// Required field ids grouped by step, in field order.
    pub fn required_fields_by_step(&self) -> std::collections::BTreeMap<u32, Vec<String>> {
        let mut by_step = std::collections::BTreeMap::new();
        for field in self.fields.iter().filter(|f| f.is_required()) {
            by_step
                .entry(field.step)
                .or_insert_with(Vec::new)
                .push(field.id.clone());
        }
        by_step
    }
}
