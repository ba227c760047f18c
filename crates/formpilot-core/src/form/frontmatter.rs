//! YAML frontmatter parser for hybrid form definitions.
//!
//! The structured header carries field definitions, tools, and metadata
//! that code parses deterministically; the markdown body below it is
//! passed to the LLM for rich conversational context.
//!
//! ```text
//! ---
//! form_id: my_form
//! title: My Form
//! fields:
//!   - id: name
//!     type: text
//!     required: true
//!     prompt: "What is your name?"
//! tools:
//!   - name: get_data
//!     purpose: "Fetch options"
//! ---
//! # My Form
//! ... markdown body for the LLM ...
//! ```

use formpilot_types::form::{
    FieldType, FormDefinition, FormField, Requirement, ToolSpec, VisibilityRule,
};
use serde_json::Value;
use tracing::warn;

/// Split a form document into its parsed frontmatter (if any) and the
/// markdown body. Malformed YAML is tolerated: the whole document is then
/// treated as body.
pub fn parse_frontmatter(form_content: &str) -> (Option<FormDefinition>, &str) {
    let stripped = form_content.trim_start();
    let Some(after_open) = stripped.strip_prefix("---") else {
        return (None, form_content);
    };

    let Some(close) = after_open.find("\n---") else {
        return (None, form_content);
    };
    let yaml_block = &after_open[..close];
    let body = after_open[close + "\n---".len()..].trim_start_matches(['-']).trim_start();

    let parsed: Value = match serde_yaml::from_str(yaml_block) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => {
            warn!("frontmatter is not a mapping, ignoring");
            return (None, form_content);
        }
        Err(err) => {
            warn!(error = %err, "failed to parse YAML frontmatter");
            return (None, form_content);
        }
    };

    (Some(definition_from_value(&parsed)), body)
}

fn definition_from_value(front: &Value) -> FormDefinition {
    let title = front
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let fields = front
        .get("fields")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(field_from_value).collect())
        .unwrap_or_default();

    let tools = front
        .get("tools")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.to_string();
                    let purpose = item
                        .get("purpose")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some(ToolSpec { name, purpose })
                })
                .collect()
        })
        .unwrap_or_default();

    FormDefinition { title, fields, tools }
}

fn field_from_value(item: &Value) -> Option<FormField> {
    let id = item.get("id")?.as_str()?.trim();
    if id.is_empty() {
        return None;
    }

    let field_type = match item.get("type").and_then(Value::as_str) {
        Some(raw) => raw.parse::<FieldType>().unwrap_or_else(|_| {
            warn!(field = id, raw, "unknown field type, defaulting to text");
            FieldType::Text
        }),
        // Required fields must always have a type in the session's type map.
        None => {
            warn!(field = id, "field has no type, defaulting to text");
            FieldType::Text
        }
    };

    let requirement = item
        .get("required")
        .map(Requirement::from_yaml_value)
        .unwrap_or_default();

    let prompt = item
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let options = item
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let options_tool = item
        .get("options_tool")
        .and_then(Value::as_str)
        .map(str::to_string);

    let step = item
        .get("step")
        .and_then(Value::as_u64)
        .map(|s| (s as u32).max(1))
        .unwrap_or(1);

    let visible_if = item
        .get("visible_if")
        .and_then(|v| serde_json::from_value::<VisibilityRule>(v.clone()).ok());

    Some(FormField {
        id: id.to_string(),
        field_type,
        requirement,
        prompt,
        options,
        options_tool,
        step,
        visible_if,
    })
}
