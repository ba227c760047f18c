//! Form-context utilities.
//!
//! A form definition is a markdown document, optionally opened by a YAML
//! frontmatter header. When the frontmatter carries a `fields` list it is
//! the authoritative source for field metadata; otherwise a markdown
//! "Field Summary" table fallback applies. The markdown body is what the
//! LLM sees as conversational context either way.

pub mod condense;
pub mod frontmatter;
pub mod markdown;
pub mod visibility;

use formpilot_types::form::FormDefinition;

/// Parse a form definition from its markdown document.
///
/// Frontmatter wins when present and non-empty; the markdown table parser
/// is the fallback. The title resolves in order: frontmatter `title`,
/// first top-level heading, the literal "Form".
pub fn parse_form_definition(form_context_md: &str) -> FormDefinition {
    let (front, body) = frontmatter::parse_frontmatter(form_context_md);

    let mut definition = match front {
        Some(front) if !front.fields.is_empty() => front,
        _ => markdown::parse_markdown_definition(body),
    };

    if definition.title.is_empty() {
        definition.title = markdown::extract_form_title(body)
            .unwrap_or_else(|| "Form".to_string());
    }

    definition
}
