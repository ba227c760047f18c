//! Greeting node -- builds the initial welcome message.
//!
//! Extracts the form title and a required-field summary from the markdown
//! so the user knows upfront what data is needed, and invites them to
//! describe everything in one message (which feeds the extraction node).

use formpilot_types::action::Action;
use formpilot_types::llm::Message;

use crate::agent::state::{Patch, StateUpdate, Turn};
use crate::form::markdown::summarize_required_fields;
use crate::form::parse_form_definition;

pub fn greeting_node(turn: &Turn) -> StateUpdate {
    let definition = parse_form_definition(&turn.session.form_context_md);
    let title = &definition.title;

    let greeting = match summarize_required_fields(&definition) {
        Some(summary) => format!(
            "Hi there! I'm FormPilot AI, and I'll be helping you fill out \
             the **{title}** form.\n\n{summary}.\n\nFeel free to tell me \
             everything you know in one message and I'll extract what I can, \
             then only ask about the rest!"
        ),
        None => format!(
            "Hi there! I'm FormPilot AI, and I'll be helping you fill out \
             the **{title}** form.\n\nGo ahead and describe all the \
             information you have. I'll take care of filling in the form \
             and only ask about anything that's missing!"
        ),
    };

    StateUpdate {
        history: vec![Message::assistant(greeting.clone())],
        action: Patch::Set(Some(Action::message(greeting))),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use formpilot_types::session::SessionState;

    const FORM: &str = "\
---
title: Leave Request
fields:
  - id: leave_type
    type: dropdown
    required: true
  - id: start_date
    type: date
    required: true
  - id: end_date
    type: date
    required: true
---
# Leave Request
";

    fn turn_for(form: &str) -> Turn {
        let definition = parse_form_definition(form);
        let session = SessionState::new(form.to_string(), &definition);
        Turn::new(
            session,
            String::new(),
            vec![],
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        )
    }

    #[test]
    fn test_greeting_mentions_title_and_fields() {
        let turn = turn_for(FORM);
        let update = greeting_node(&turn);

        let Patch::Set(Some(Action::Message { text })) = &update.action else {
            panic!("expected a MESSAGE action");
        };
        assert!(text.contains("Leave Request"));
        assert!(text.contains("3 items"));
        assert_eq!(update.history.len(), 1);
        assert_eq!(update.history[0].content, *text);
        assert!(update.answers.is_empty());
    }

    #[test]
    fn test_greeting_without_required_fields() {
        let turn = turn_for("# Feedback\n\nJust tell us what you think.");
        let update = greeting_node(&turn);
        let Patch::Set(Some(Action::Message { text })) = &update.action else {
            panic!("expected a MESSAGE action");
        };
        assert!(text.contains("Feedback"));
        assert!(text.contains("describe all the information"));
    }
}
