//! Extraction node -- bulk extraction from the user's first message.
//!
//! Runs at most once per session. Calls the LLM exactly once with the
//! extraction prompt to pull multiple field values out of a single
//! free-text description, validating date/datetime values before
//! storing. There is no retry here: unparseable output just means zero
//! extracted answers, and the conversation node (which owns the whole
//! corrective-retry budget for the turn) asks field by field instead.

use formpilot_types::llm::{CompletionRequest, Message};
use formpilot_types::session::AskKind;
use tracing::warn;

use crate::agent::guards::extract_json;
use crate::agent::payload::LlmPayload;
use crate::agent::prompt::build_extraction_prompt;
use crate::agent::state::{Patch, StateUpdate, Turn};
use crate::agent::validate::validate_answer;
use crate::llm::BoxLlmProvider;

pub async fn extraction_node(turn: &Turn, llm: &BoxLlmProvider, model: &str) -> StateUpdate {
    let session = &turn.session;

    let mut update = StateUpdate {
        initial_extraction_done: Patch::Set(true),
        user_message_added: Patch::Set(true),
        ..Default::default()
    };
    if !turn.user_message.trim().is_empty() {
        update.history.push(Message::user(turn.user_message.clone()));
    }

    let system = build_extraction_prompt(session);
    let request = CompletionRequest::new(
        model,
        system,
        vec![Message::user(turn.user_message.clone())],
    );

    let content = match llm.complete(&request).await {
        Ok(response) => response.content,
        Err(err) => {
            // Extraction never fails the turn; the conversation node takes
            // over with single-field questioning.
            warn!(error = %err, "extraction LLM call failed");
            return update;
        }
    };

    let Some(value) = extract_json(&content) else {
        warn!("extraction returned non-JSON output, storing nothing");
        return update;
    };
    let parsed = match LlmPayload::from_value(&value) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "extraction payload failed validation, storing nothing");
            return update;
        }
    };

    match parsed {
        LlmPayload::MultiAnswer { answers, message } => {
            for (field_id, value) in answers {
                // Dates and datetimes must survive the format rules; a
                // rejected value is dropped silently and asked for later.
                if let Some(field_type) = session.field_types.get(&field_id) {
                    let kind = AskKind::for_field_type(*field_type);
                    if matches!(kind, AskKind::Date | AskKind::Datetime) {
                        let raw = match value.as_str() {
                            Some(s) => s.to_string(),
                            None => value.to_string(),
                        };
                        match validate_answer(kind, &raw, turn.today) {
                            Ok(normalized) => {
                                update.answers.insert(field_id, normalized);
                            }
                            Err(err) => {
                                warn!(field = %field_id, value = %raw, error = %err,
                                    "extraction rejected invalid date value");
                            }
                        }
                        continue;
                    }
                }
                update.answers.insert(field_id, value);
            }

            if let Some(message) = message {
                if !message.is_empty() {
                    update.history.push(Message::assistant(message));
                }
            }
            update
        }
        direct => {
            // The LLM pre-empted with a direct action; hand it to finalize.
            update.parsed = Patch::Set(Some(direct));
            update
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use formpilot_types::llm::{CompletionResponse, LlmError, Usage};
    use formpilot_types::session::SessionState;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    use crate::agent::payload::ActionKind;
    use crate::form::parse_form_definition;
    use crate::llm::LlmProvider;

    const FORM: &str = "\
---
title: Leave Request
fields:
  - id: leave_type
    type: dropdown
    required: true
    options: [Annual, Sick]
  - id: start_date
    type: date
    required: true
  - id: end_date
    type: date
    required: true
---
# Leave Request
";

    struct Scripted {
        responses: Mutex<Vec<String>>,
        calls: Arc<Mutex<usize>>,
    }

    impl Scripted {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::EmptyCompletion);
            }
            Ok(CompletionResponse {
                content: responses.remove(0),
                model: request.model.clone(),
                usage: Usage::default(),
            })
        }
    }

    fn turn_with_message(message: &str) -> Turn {
        let definition = parse_form_definition(FORM);
        let session = SessionState::new(FORM.to_string(), &definition);
        Turn::new(
            session,
            message.to_string(),
            vec![],
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_multi_answer_extraction() {
        let llm = BoxLlmProvider::new(Scripted::new(vec![json!({
            "intent": "multi_answer",
            "answers": {"leave_type": "Annual", "start_date": "2026-03-01"},
            "message": "Got your leave type and start date!"
        })
        .to_string()]));
        let turn = turn_with_message("Annual leave starting 2026-03-01");

        let update = extraction_node(&turn, &llm, "default").await;

        assert!(matches!(update.initial_extraction_done, Patch::Set(true)));
        assert_eq!(update.answers["leave_type"], json!("Annual"));
        assert_eq!(update.answers["start_date"], json!("2026-03-01"));
        // user message + assistant summary
        assert_eq!(update.history.len(), 2);
        assert!(matches!(update.parsed, Patch::Keep));
    }

    #[tokio::test]
    async fn test_invalid_date_dropped_silently() {
        let llm = BoxLlmProvider::new(Scripted::new(vec![json!({
            "intent": "multi_answer",
            "answers": {"leave_type": "Annual", "start_date": "whenever works"},
        })
        .to_string()]));
        let turn = turn_with_message("Annual leave, starting whenever works");

        let update = extraction_node(&turn, &llm, "default").await;

        assert_eq!(update.answers["leave_type"], json!("Annual"));
        assert!(!update.answers.contains_key("start_date"));
    }

    #[tokio::test]
    async fn test_date_values_normalized() {
        let llm = BoxLlmProvider::new(Scripted::new(vec![json!({
            "intent": "multi_answer",
            "answers": {"start_date": "March 1, 2026"},
        })
        .to_string()]));
        let turn = turn_with_message("starting March 1st");

        let update = extraction_node(&turn, &llm, "default").await;
        assert_eq!(update.answers["start_date"], json!("2026-03-01"));
    }

    #[tokio::test]
    async fn test_direct_action_preempts() {
        let llm = BoxLlmProvider::new(Scripted::new(vec![json!({
            "action": "ASK_DATE", "field_id": "start_date", "label": "When does it start?"
        })
        .to_string()]));
        let turn = turn_with_message("I want to take some leave");

        let update = extraction_node(&turn, &llm, "default").await;

        let Patch::Set(Some(parsed)) = &update.parsed else {
            panic!("expected a direct parsed action");
        };
        assert_eq!(parsed.as_action().unwrap().kind, ActionKind::AskDate);
        assert!(update.answers.is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_adds_no_answers() {
        let llm = BoxLlmProvider::new(Scripted::new(vec![]));
        let turn = turn_with_message("hello");

        let update = extraction_node(&turn, &llm, "default").await;

        assert!(update.answers.is_empty());
        assert!(matches!(update.initial_extraction_done, Patch::Set(true)));
        assert!(matches!(update.parsed, Patch::Keep));
    }

    #[tokio::test]
    async fn test_non_json_output_makes_one_call_and_moves_on() {
        let stub = Scripted::new(vec![
            "I found the leave type, it is Annual".to_string(),
            "this response must never be requested".to_string(),
        ]);
        let calls = stub.calls.clone();
        let llm = BoxLlmProvider::new(stub);
        let turn = turn_with_message("Annual leave please");

        let update = extraction_node(&turn, &llm, "default").await;

        // No retry: exactly one call, nothing stored, turn proceeds.
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(update.answers.is_empty());
        assert!(matches!(update.initial_extraction_done, Patch::Set(true)));
        assert!(matches!(update.parsed, Patch::Keep));
    }
}
