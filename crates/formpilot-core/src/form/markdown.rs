//! Markdown-side form parsing.
//!
//! Covers forms that ship without frontmatter: the title comes from the
//! first top-level heading, field metadata from a "Field Summary" table,
//! and tools from a "Tool Calls" bullet list. Also builds the
//! required-field summary the greeting uses.

use std::collections::BTreeMap;

use formpilot_types::form::{FieldType, FormDefinition, FormField, Requirement, ToolSpec};

/// Extract the form title from the first top-level `# ` heading.
pub fn extract_form_title(markdown: &str) -> Option<String> {
    markdown.lines().find_map(|line| {
        let trimmed = line.trim();
        trimmed
            .strip_prefix("# ")
            .map(|rest| rest.trim().to_string())
            .filter(|title| !title.is_empty())
    })
}

/// Parse field and tool metadata out of plain markdown.
pub fn parse_markdown_definition(markdown: &str) -> FormDefinition {
    FormDefinition {
        title: extract_form_title(markdown).unwrap_or_default(),
        fields: parse_field_table(markdown),
        tools: parse_tool_list(markdown),
    }
}

/// Parse the "Field Summary" table.
///
/// Recognized column layout: `| field_id | type | required | prompt |`
/// (header match is by name, so column order is free). The required cell
/// is truthy for `yes`, `true`, `required`, or a checkmark.
fn parse_field_table(markdown: &str) -> Vec<FormField> {
    let mut fields = Vec::new();
    let mut header: Option<TableHeader> = None;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('|') {
            header = None;
            continue;
        }

        let cells = split_row(trimmed);
        if cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')) {
            continue; // separator row
        }

        match &header {
            None => {
                header = TableHeader::from_cells(&cells);
            }
            Some(columns) => {
                if let Some(field) = columns.parse_row(&cells) {
                    fields.push(field);
                }
            }
        }
    }

    fields
}

struct TableHeader {
    id: usize,
    field_type: Option<usize>,
    required: Option<usize>,
    prompt: Option<usize>,
}

impl TableHeader {
    fn from_cells(cells: &[String]) -> Option<Self> {
        let find = |names: &[&str]| {
            cells.iter().position(|c| {
                let lower = c.to_lowercase();
                names.iter().any(|n| lower.contains(n))
            })
        };
        let id = find(&["field id", "field_id", "id"])?;
        let field_type = find(&["type"]);
        // Header must look like a field table, not arbitrary markdown
        field_type?;
        Some(Self {
            id,
            field_type,
            required: find(&["required"]),
            prompt: find(&["prompt", "label", "question"]),
        })
    }

    fn parse_row(&self, cells: &[String]) -> Option<FormField> {
        let id = cells.get(self.id)?.trim_matches('`').trim();
        if id.is_empty() {
            return None;
        }

        let field_type = self
            .field_type
            .and_then(|i| cells.get(i))
            .and_then(|raw| raw.parse::<FieldType>().ok())
            .unwrap_or(FieldType::Text);

        let requirement = self
            .required
            .and_then(|i| cells.get(i))
            .map(|raw| {
                let lower = raw.trim().to_lowercase();
                if lower == "conditional" {
                    Requirement::Conditional
                } else if matches!(lower.as_str(), "yes" | "true" | "required" | "✓" | "x") {
                    Requirement::Required
                } else {
                    Requirement::Optional
                }
            })
            .unwrap_or(Requirement::Optional);

        let prompt = self
            .prompt
            .and_then(|i| cells.get(i))
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Some(FormField {
            id: id.to_string(),
            field_type,
            requirement,
            prompt,
            options: vec![],
            options_tool: None,
            step: 1,
            visible_if: None,
        })
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

/// Parse the "Tool Calls" section's bullet list.
///
/// Recognized shapes: `` - `tool_name`: purpose `` and `- tool_name: purpose`.
fn parse_tool_list(markdown: &str) -> Vec<ToolSpec> {
    let mut tools = Vec::new();
    let mut in_section = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            in_section = heading_text(trimmed).eq_ignore_ascii_case("tool calls");
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(bullet) = trimmed.strip_prefix("- ") {
            let (name, purpose) = match bullet.split_once(':') {
                Some((n, p)) => (n, p.trim()),
                None => (bullet, ""),
            };
            let name = name.trim().trim_matches('`').trim();
            if !name.is_empty() && !name.contains(' ') {
                tools.push(ToolSpec {
                    name: name.to_string(),
                    purpose: purpose.to_string(),
                });
            }
        }
    }

    tools
}

fn heading_text(line: &str) -> &str {
    line.trim_start_matches('#').trim()
}

/// Human summary of the required fields, for the greeting.
///
/// e.g. "We'll go through about 4 items: a couple of dates, one dropdown,
/// and one text field". Returns `None` when the form has no required
/// fields to describe.
pub fn summarize_required_fields(definition: &FormDefinition) -> Option<String> {
    let required: Vec<&FormField> = definition.fields.iter().filter(|f| f.is_required()).collect();
    if required.is_empty() {
        return None;
    }

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for field in &required {
        *counts.entry(plural_name(field.field_type)).or_default() += 1;
    }

    let parts: Vec<String> = counts
        .iter()
        .map(|(name, count)| format!("{} {name}", count_phrase(*count)))
        .collect();

    let listed = match parts.len() {
        1 => parts[0].clone(),
        2 => format!("{} and {}", parts[0], parts[1]),
        _ => format!(
            "{}, and {}",
            parts[..parts.len() - 1].join(", "),
            parts[parts.len() - 1]
        ),
    };

    Some(format!(
        "We'll go through about {} item{}: {}",
        required.len(),
        if required.len() == 1 { "" } else { "s" },
        listed
    ))
}

fn count_phrase(count: usize) -> &'static str {
    match count {
        1 => "one",
        2 => "a couple of",
        3 | 4 => "a few",
        _ => "some",
    }
}

fn plural_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "text fields",
        FieldType::Dropdown => "dropdowns",
        FieldType::Checkbox => "checkbox picks",
        FieldType::Date => "dates",
        FieldType::Datetime => "date-times",
        FieldType::Location => "locations",
        FieldType::Time => "times",
        FieldType::File => "file uploads",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_form_title() {
        assert_eq!(
            extract_form_title("# Leave Request\n\nbody"),
            Some("Leave Request".to_string())
        );
        assert_eq!(extract_form_title("## Not Top Level"), None);
        assert_eq!(extract_form_title("no headings"), None);
    }

    #[test]
    fn test_parse_field_table() {
        let md = "\
# Incident Report

## Field Summary

| Field ID | Type | Required | Prompt |
|----------|------|----------|--------|
| `establishment` | dropdown | yes | Which establishment? |
| injury_date | date | yes | When did it happen? |
| notes | text | no | |
";
        let fields = parse_field_table(md);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].id, "establishment");
        assert_eq!(fields[0].field_type, FieldType::Dropdown);
        assert!(fields[0].is_required());
        assert!(!fields[2].is_required());
        assert!(fields[2].prompt.is_none());
    }

    #[test]
    fn test_non_field_tables_ignored() {
        let md = "\
| City | Population |
|------|------------|
| Riyadh | 7M |
";
        assert!(parse_field_table(md).is_empty());
    }

    #[test]
    fn test_parse_tool_list() {
        let md = "\
## Tool Calls

- `get_establishments`: Fetch the user's registered establishments
- get_injury_types: List valid injury classifications

## Form Overview

- not_a_tool: this is outside the section
";
        let tools = parse_tool_list(md);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "get_establishments");
        assert_eq!(tools[1].name, "get_injury_types");
    }

    #[test]
    fn test_summarize_required_fields() {
        let md = "\
| Field ID | Type | Required |
|---|---|---|
| a | date | yes |
| b | date | yes |
| c | dropdown | yes |
| d | text | no |
";
        let def = parse_markdown_definition(md);
        let summary = summarize_required_fields(&def).unwrap();
        assert!(summary.contains("3 items"));
        assert!(summary.contains("a couple of dates"));
        assert!(summary.contains("one dropdown"));
    }

    #[test]
    fn test_summarize_empty_form() {
        let def = FormDefinition::default();
        assert!(summarize_required_fields(&def).is_none());
    }
}
