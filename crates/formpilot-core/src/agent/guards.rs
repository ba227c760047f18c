//! Output guards: JSON extraction, defect detection, corrective retries.
//!
//! The LLM is called through [`call_llm_with_guards`], which parses the
//! response, checks it against a closed set of defects, and on a hit
//! appends a corrective message to a local copy of the history and calls
//! again. A failed retry never pollutes the session's persisted history.
//! The call budget is hard-capped at [`MAX_LLM_ATTEMPTS`] per turn.

use std::collections::BTreeMap;

use formpilot_types::form::FormDefinition;
use formpilot_types::llm::{CompletionRequest, Message};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::payload::{ActionKind, ActionPayload, LlmPayload, PayloadError};
use crate::llm::BoxLlmProvider;

/// Hard cap on LLM calls per turn: one initial call plus corrective retries.
pub const MAX_LLM_ATTEMPTS: usize = 3;

/// Corrective prompt for non-JSON output. Blunt on purpose: small models
/// need direct instructions.
pub const JSON_RETRY_PROMPT: &str = "\
WRONG. Your response was NOT a valid JSON action. You MUST respond with \
ONLY a JSON object like: {\"action\": \"MESSAGE\", \"text\": \"hello\"} \
NO explanations. NO markdown. NO plain text. ONLY JSON. Try again now.";

const ALLOWED_KINDS: &str = "MESSAGE, ASK_TEXT, ASK_DROPDOWN, ASK_CHECKBOX, \
ASK_DATE, ASK_DATETIME, ASK_LOCATION, TOOL_CALL, FORM_COMPLETE";

/// Extract a JSON object from LLM output.
///
/// Tries, in order: direct parse, the contents of fenced code blocks, a
/// greedy brace-matched substring.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    if trimmed.contains("```") {
        for part in trimmed.split("```") {
            let mut candidate = part.trim();
            if let Some(rest) = candidate.strip_prefix("json") {
                candidate = rest.trim();
            }
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    None
}

/// Session facts the guards check an LLM response against.
pub struct GuardContext<'a> {
    pub definition: &'a FormDefinition,
    pub answers: &'a BTreeMap<String, Value>,
    pub required_fields: &'a [String],
    pub initial_extraction_done: bool,
    /// Set by the step-confirmation edit path: the user explicitly asked
    /// to change an already answered field, so the re-ask guard stands down.
    pub allow_answered_field_update: bool,
    /// A text answer currently held for contextual validation. The field
    /// counts as answered for the missing-field guards (so FORM_COMPLETE
    /// is legal when it was the last gap), yet re-asking it stays allowed
    /// because rejection IS a re-ask.
    pub held_text_field_id: Option<&'a str>,
}

impl GuardContext<'_> {
    fn missing_fields(&self) -> Vec<&str> {
        self.required_fields
            .iter()
            .filter(|id| !self.answers.contains_key(*id))
            .filter(|id| Some(id.as_str()) != self.held_text_field_id)
            .map(String::as_str)
            .collect()
    }

    fn next_missing(&self) -> Option<&str> {
        self.missing_fields().into_iter().next()
    }

    fn answered_list(&self) -> String {
        self.answers.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// What a guard decided about one parsed response.
enum Verdict {
    Accept(LlmPayload),
    Retry(String),
}

/// Call the LLM and parse its JSON response, with guarded retries.
///
/// `messages` is this turn's view of the conversation; corrective retry
/// messages are appended to it locally and discarded with it. Returns
/// `None` when every attempt failed, in which case the caller emits the
/// fallback MESSAGE action.
pub async fn call_llm_with_guards(
    llm: &BoxLlmProvider,
    model: &str,
    system: &str,
    mut messages: Vec<Message>,
    ctx: GuardContext<'_>,
) -> Option<LlmPayload> {
    let mut message_guard_fired = false;

    for attempt in 1..=MAX_LLM_ATTEMPTS {
        info!(attempt, total = MAX_LLM_ATTEMPTS, messages = messages.len(), "calling LLM");

        let request = CompletionRequest::new(model, system.to_string(), messages.clone());
        let content = match llm.complete(&request).await {
            Ok(response) => response.content,
            Err(err) => {
                warn!(attempt, error = %err, "LLM call failed");
                if attempt == MAX_LLM_ATTEMPTS {
                    return None;
                }
                continue;
            }
        };

        debug!(raw = %content.chars().take(500).collect::<String>(), "LLM raw response");

        let Some(value) = extract_json(&content) else {
            warn!(attempt, "LLM returned invalid JSON");
            messages.push(Message::user(JSON_RETRY_PROMPT));
            continue;
        };

        match check_payload(&value, &ctx, &mut message_guard_fired) {
            Verdict::Accept(payload) => {
                info!(
                    kind = payload
                        .as_action()
                        .map(|a| a.kind.tag())
                        .unwrap_or("multi_answer"),
                    "LLM returned valid action"
                );
                return Some(payload);
            }
            Verdict::Retry(corrective) => {
                messages.push(Message::user(corrective));
            }
        }
    }

    warn!("all LLM attempts exhausted without a valid action");
    None
}

/// Parse a JSON object and run the guard table against it, in order.
fn check_payload(value: &Value, ctx: &GuardContext<'_>, message_guard_fired: &mut bool) -> Verdict {
    let payload = match LlmPayload::from_value(value) {
        Ok(payload) => payload,
        Err(PayloadError::UnknownKind { kind, salvage_text }) => {
            warn!(kind = %kind, "LLM returned unknown action kind");
            // Salvage text content into a MESSAGE rather than burning a
            // retry, unless the form is mid-flight and needs an ASK_*.
            if let Some(text) = salvage_text {
                let salvaged = LlmPayload::Action(message_payload(text));
                return run_action_guards(salvaged, ctx, message_guard_fired);
            }
            return Verdict::Retry(format!(
                "WRONG. '{kind}' is not a valid action. The only allowed values are: \
                 {ALLOWED_KINDS}. Respond again with one of those."
            ));
        }
        Err(err @ (PayloadError::NoKind | PayloadError::MissingKey { .. })) => {
            warn!(error = %err, "LLM payload failed validation");
            return Verdict::Retry(JSON_RETRY_PROMPT.to_string());
        }
    };

    run_action_guards(payload, ctx, message_guard_fired)
}

fn run_action_guards(
    payload: LlmPayload,
    ctx: &GuardContext<'_>,
    message_guard_fired: &mut bool,
) -> Verdict {
    let LlmPayload::Action(action) = &payload else {
        // multi_answer has no action-shaped defects to guard
        return Verdict::Accept(payload);
    };

    // Re-asking an already answered field
    if action.kind.is_ask() && !ctx.allow_answered_field_update {
        if let Some(field_id) = &action.field_id {
            if let Some(stored) = ctx.answers.get(field_id) {
                warn!(field = %field_id, "LLM re-asked an answered field");
                let next = ctx.next_missing().unwrap_or("none");
                return Verdict::Retry(format!(
                    "WRONG. The field '{field_id}' is already answered with {stored}. \
                     Already answered fields: [{}]. Ask the NEXT unanswered field: '{next}'.",
                    ctx.answered_list()
                ));
            }
        }
    }

    // MESSAGE while required fields remain
    if action.kind == ActionKind::Message
        && ctx.initial_extraction_done
        && !ctx.answers.is_empty()
        && action.field_id.is_none()
    {
        if let Some(next) = ctx.next_missing() {
            if !*message_guard_fired {
                *message_guard_fired = true;
                warn!("LLM returned MESSAGE during active form filling");
                return Verdict::Retry(format!(
                    "WRONG format. You returned MESSAGE but you should be asking for \
                     the next unanswered form field '{next}'. Already answered: [{}]. \
                     Use the correct ASK_* action for '{next}', not MESSAGE.",
                    ctx.answered_list()
                ));
            }
        }
    }

    // Dropdown/checkbox with no options: the required TOOL_CALL was skipped
    if matches!(action.kind, ActionKind::AskDropdown | ActionKind::AskCheckbox)
        && action.options.is_empty()
    {
        let field = action.field_id.as_deref().unwrap_or("?");
        warn!(field, kind = action.kind.tag(), "LLM asked with empty options");
        let tool_hint = action
            .field_id
            .as_deref()
            .and_then(|id| ctx.definition.field(id))
            .and_then(|f| f.options_tool.as_deref())
            .map(|tool| format!("Emit TOOL_CALL for '{tool}' first."))
            .unwrap_or_else(|| {
                "Check the form: which tool provides data for this field? \
                 Emit a TOOL_CALL for that tool first."
                    .to_string()
            });
        return Verdict::Retry(format!(
            "WRONG. You returned {} with empty options. You do NOT have the \
             options yet. {tool_hint} Do not ask a dropdown with empty options.",
            action.kind.tag()
        ));
    }

    // Premature FORM_COMPLETE
    if action.kind == ActionKind::FormComplete {
        let missing = ctx.missing_fields();
        if !missing.is_empty() {
            warn!(missing = ?missing, "LLM returned premature FORM_COMPLETE");
            let next = missing[0];
            return Verdict::Retry(format!(
                "WRONG. You returned FORM_COMPLETE but these required fields are \
                 still unanswered: [{}]. Ask the NEXT missing field: '{next}'.",
                missing.join(", ")
            ));
        }
    }

    Verdict::Accept(payload)
}

fn message_payload(text: String) -> ActionPayload {
    ActionPayload {
        kind: ActionKind::Message,
        text: Some(text),
        message: None,
        field_id: None,
        label: None,
        options: vec![],
        tool_name: None,
        tool_args: serde_json::Map::new(),
        data: None,
        value: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmProvider;
    use formpilot_types::llm::{CompletionResponse, LlmError, Usage};
    use serde_json::json;
    use std::sync::Mutex;

    /// Deterministic provider that replays scripted responses in order.
    struct Scripted {
        responses: Mutex<Vec<Result<String, ()>>>,
        calls: Mutex<Vec<Vec<Message>>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, ()>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
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
            self.calls.lock().unwrap().push(request.messages.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::EmptyCompletion);
            }
            match responses.remove(0) {
                Ok(content) => Ok(CompletionResponse {
                    content,
                    model: request.model.clone(),
                    usage: Usage::default(),
                }),
                Err(()) => Err(LlmError::Provider {
                    message: "scripted failure".to_string(),
                }),
            }
        }
    }

    fn definition() -> FormDefinition {
        crate::form::parse_form_definition(
            "---\ntitle: T\nfields:\n  - id: establishment\n    type: dropdown\n    required: true\n    options_tool: get_establishments\n  - id: injury_date\n    type: date\n    required: true\n---\n# T\n",
        )
    }

    async fn run_guarded(
        provider: Scripted,
        answers: BTreeMap<String, Value>,
        required: Vec<String>,
    ) -> Option<LlmPayload> {
        let definition = definition();
        let llm = BoxLlmProvider::new(provider);
        let ctx = GuardContext {
            definition: &definition,
            answers: &answers,
            required_fields: &required,
            initial_extraction_done: true,
            allow_answered_field_update: false,
            held_text_field_id: None,
        };
        call_llm_with_guards(&llm, "default", "system", vec![Message::user("hi")], ctx).await
    }

    #[test]
    fn test_extract_json_direct() {
        let value = extract_json(r#"{"action": "MESSAGE", "text": "hi"}"#).unwrap();
        assert_eq!(value["action"], json!("MESSAGE"));
    }

    #[test]
    fn test_extract_json_fenced() {
        let content = "Here you go:\n```json\n{\"action\": \"MESSAGE\", \"text\": \"hi\"}\n```";
        let value = extract_json(content).unwrap();
        assert_eq!(value["text"], json!("hi"));
    }

    #[test]
    fn test_extract_json_brace_matched() {
        let content = "Sure! {\"action\": \"MESSAGE\", \"text\": \"hi\"} hope that helps";
        let value = extract_json(content).unwrap();
        assert_eq!(value["action"], json!("MESSAGE"));
    }

    #[test]
    fn test_extract_json_rejects_non_objects() {
        assert!(extract_json("[1, 2, 3]").is_none());
        assert!(extract_json("no json here").is_none());
    }

    #[tokio::test]
    async fn test_invalid_json_then_valid_retries() {
        let provider = Scripted::new(vec![
            Ok("I think the answer is...".to_string()),
            Ok(r#"{"action": "ASK_DATE", "field_id": "injury_date", "label": "When?"}"#.to_string()),
        ]);
        let result = run_guarded(
            provider,
            BTreeMap::new(),
            vec!["injury_date".to_string()],
        ).await;
        let payload = result.unwrap();
        assert_eq!(payload.as_action().unwrap().kind, ActionKind::AskDate);
    }

    #[tokio::test]
    async fn test_reask_answered_field_guard() {
        let mut answers = BTreeMap::new();
        answers.insert("injury_date".to_string(), json!("2026-01-02"));
        let provider = Scripted::new(vec![
            Ok(r#"{"action": "ASK_DATE", "field_id": "injury_date", "label": "When?"}"#.to_string()),
            Ok(r#"{"action": "ASK_DROPDOWN", "field_id": "establishment", "label": "Which?", "options": ["A"]}"#.to_string()),
        ]);
        let result = run_guarded(
            provider,
            answers,
            vec!["injury_date".to_string(), "establishment".to_string()],
        ).await;
        let payload = result.unwrap();
        assert_eq!(payload.as_action().unwrap().kind, ActionKind::AskDropdown);
    }

    #[tokio::test]
    async fn test_empty_dropdown_options_guard_names_tool() {
        let provider = Scripted::new(vec![
            Ok(r#"{"action": "ASK_DROPDOWN", "field_id": "establishment", "label": "Which?", "options": []}"#.to_string()),
            Ok(r#"{"action": "TOOL_CALL", "tool_name": "get_establishments", "tool_args": {}}"#.to_string()),
        ]);
        let result = run_guarded(provider, BTreeMap::new(), vec!["establishment".to_string()]).await;
        let payload = result.unwrap();
        assert_eq!(
            payload.as_action().unwrap().tool_name.as_deref(),
            Some("get_establishments")
        );
    }

    #[tokio::test]
    async fn test_premature_completion_guard() {
        let provider = Scripted::new(vec![
            Ok(r#"{"action": "FORM_COMPLETE", "data": {}}"#.to_string()),
            Ok(r#"{"action": "ASK_DATE", "field_id": "injury_date", "label": "When?"}"#.to_string()),
        ]);
        let result = run_guarded(provider, BTreeMap::new(), vec!["injury_date".to_string()]).await;
        assert_eq!(result.unwrap().as_action().unwrap().kind, ActionKind::AskDate);
    }

    #[tokio::test]
    async fn test_unknown_kind_salvaged_when_form_idle() {
        // No answers yet, so the MESSAGE guard stands down and the salvage
        // converts the unknown action into a MESSAGE.
        let provider = Scripted::new(vec![Ok(
            r#"{"action": "CHAT", "text": "Happy to help!"}"#.to_string()
        )]);
        let result = run_guarded(provider, BTreeMap::new(), vec!["injury_date".to_string()]).await;
        let payload = result.unwrap();
        let action = payload.as_action().unwrap();
        assert_eq!(action.kind, ActionKind::Message);
        assert_eq!(action.text.as_deref(), Some("Happy to help!"));
    }

    #[tokio::test]
    async fn test_message_guard_fires_once_then_accepts() {
        let mut answers = BTreeMap::new();
        answers.insert("establishment".to_string(), json!("A"));
        // The model insists on MESSAGE twice; the guard retries once, then
        // lets the second MESSAGE through rather than looping forever.
        let provider = Scripted::new(vec![
            Ok(r#"{"action": "MESSAGE", "text": "tell me more"}"#.to_string()),
            Ok(r#"{"action": "MESSAGE", "text": "tell me more"}"#.to_string()),
        ]);
        let result = run_guarded(
            provider,
            answers,
            vec!["establishment".to_string(), "injury_date".to_string()],
        ).await;
        assert_eq!(result.unwrap().as_action().unwrap().kind, ActionKind::Message);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none() {
        let provider = Scripted::new(vec![
            Ok("garbage".to_string()),
            Ok("more garbage".to_string()),
            Ok("still garbage".to_string()),
        ]);
        let result = run_guarded(provider, BTreeMap::new(), vec!["injury_date".to_string()]).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_then_success() {
        let provider = Scripted::new(vec![
            Err(()),
            Ok(r#"{"action": "ASK_DATE", "field_id": "injury_date", "label": "When?"}"#.to_string()),
        ]);
        let result = run_guarded(provider, BTreeMap::new(), vec!["injury_date".to_string()]).await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_all_transport_errors_returns_none() {
        let provider = Scripted::new(vec![Err(()), Err(()), Err(())]);
        let result = run_guarded(provider, BTreeMap::new(), vec!["injury_date".to_string()]).await;
        assert!(result.is_none());
    }
}
